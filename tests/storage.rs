mod tests {
    use embedded_storage::nor_flash::NorFlash;
    use myrtio_dmx_light::storage::{LogError, NorFlashLog, RamFlash, RecordLog};

    const FILE: u16 = 0x0C0F;
    const BANK: u32 = 512;

    fn mounted() -> NorFlashLog<RamFlash<1024>> {
        NorFlashLog::new(RamFlash::new(), 0, BANK).unwrap()
    }

    fn read_back(log: &mut NorFlashLog<RamFlash<1024>>, key: u16) -> Vec<u8> {
        let desc = log.find(FILE, key).unwrap();
        let mut buf = [0u8; 64];
        let len = log.read(&desc, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn test_write_and_find() {
        let mut log = mounted();
        assert_eq!(log.find(FILE, 1), Err(LogError::NotFound));

        log.write(FILE, 1, &[1, 2, 3]).unwrap();
        log.write(FILE, 2, &[9; 8]).unwrap();
        assert_eq!(read_back(&mut log, 1), vec![1, 2, 3]);
        assert_eq!(read_back(&mut log, 2), vec![9; 8]);
        assert_eq!(log.find(0x0001, 1), Err(LogError::NotFound));
    }

    #[test]
    fn test_latest_record_wins() {
        let mut log = mounted();
        let desc = log.write(FILE, 1, &[1, 1, 1, 1]).unwrap();
        log.update(&desc, &[2, 2, 2, 2]).unwrap();
        assert_eq!(read_back(&mut log, 1), vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_remount_keeps_records() {
        let mut log = mounted();
        log.write(FILE, 1, &[5, 6]).unwrap();
        let desc = log.write(FILE, 2, &[7]).unwrap();
        log.update(&desc, &[8]).unwrap();
        let free = log.free_space();

        let mut log = NorFlashLog::new(log.into_inner(), 0, BANK).unwrap();
        assert_eq!(log.free_space(), free);
        assert_eq!(read_back(&mut log, 1), vec![5, 6]);
        assert_eq!(read_back(&mut log, 2), vec![8]);
    }

    #[test]
    fn test_full_bank_and_compaction() {
        let mut log = mounted();
        let mut written = 0u8;
        loop {
            match log.write(FILE, 1, &[written; 8]) {
                Ok(_) => written += 1,
                Err(LogError::NoSpace) => break,
                Err(err) => panic!("unexpected {err:?}"),
            }
        }
        log.write(FILE, 2, &[0xAB; 4]).unwrap_err();
        assert_eq!(read_back(&mut log, 1), vec![written - 1; 8]);

        log.collect_garbage().unwrap();
        assert_eq!(read_back(&mut log, 1), vec![written - 1; 8]);
        log.write(FILE, 2, &[0xAB; 4]).unwrap();
        assert_eq!(read_back(&mut log, 2), vec![0xAB; 4]);

        // The compacted bank wins after a remount
        let mut log = NorFlashLog::new(log.into_inner(), 0, BANK).unwrap();
        assert_eq!(read_back(&mut log, 1), vec![written - 1; 8]);
        assert_eq!(read_back(&mut log, 2), vec![0xAB; 4]);
    }

    #[test]
    fn test_erase() {
        let mut log = mounted();
        log.write(FILE, 1, &[1]).unwrap();
        log.erase().unwrap();
        assert_eq!(log.find(FILE, 1), Err(LogError::NotFound));
        assert_eq!(log.free_space(), BANK - 8);
    }

    #[test]
    fn test_rejects_bad_geometry_and_oversized_records() {
        assert_eq!(
            NorFlashLog::new(RamFlash::<1024>::new(), 0, 300).err(),
            Some(LogError::Geometry)
        );
        assert_eq!(
            NorFlashLog::new(RamFlash::<1024>::new(), 256, 512).err(),
            Some(LogError::Geometry)
        );

        let mut log = mounted();
        assert_eq!(log.write(FILE, 1, &[0; 65]), Err(LogError::TooLarge));
    }

    #[test]
    fn test_torn_record_is_skipped() {
        let mut log = mounted();
        log.write(FILE, 1, &[1, 2, 3, 4]).unwrap();
        let mut flash = log.into_inner();

        // Header and data of a record whose commit word never made it
        let torn = [0xEF, 0xBE, 0x0F, 0x0C, 0x01, 0x00, 0x04, 0x00];
        flash.write(8 + 16, &torn).unwrap();
        flash.write(8 + 16 + 8, &[9, 9, 9, 9]).unwrap();

        let mut log = NorFlashLog::new(flash, 0, BANK).unwrap();
        assert_eq!(read_back(&mut log, 1), vec![1, 2, 3, 4]);
        log.write(FILE, 1, &[5, 6, 7, 8]).unwrap();
        assert_eq!(read_back(&mut log, 1), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_read_into_short_buffer() {
        let mut log = mounted();
        let desc = log.write(FILE, 3, &[7; 20]).unwrap();
        let mut short = [0u8; 16];
        assert_eq!(log.read(&desc, &mut short), Err(LogError::TooLarge));
        let mut exact = [0u8; 20];
        assert_eq!(log.read(&desc, &mut exact), Ok(20));
        assert_eq!(exact, [7; 20]);
    }
}
