mod tests {
    use core::pin::pin;

    use embassy_futures::{block_on, poll_once};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use myrtio_dmx_light::cfg::{ConfigStore, LED_RENDER, ParamId, RenderConfig, StoreSettings};
    use myrtio_dmx_light::color::{ColorMode, Curve, Rgb};
    use myrtio_dmx_light::config::MAX_LEDS_PER_CHANNEL;
    use myrtio_dmx_light::dmx::{DmxIngest, Uid};
    use myrtio_dmx_light::program::{DefaultProgram, LedChan, NoProgram, ProgramSource, UserProgram};
    use myrtio_dmx_light::render::{
        ChannelSettings, ChannelShared, ControlCommand, ControlError, CycleScheduler, DoubleBuffer,
        LedTransport, PixelRenderer, RenderChannel, RenderProps, SendComplete,
    };
    use myrtio_dmx_light::storage::{NorFlashLog, RamFlash};
    use myrtio_dmx_light::transcode::{Encoding, OutputBuffer, Spi8Mhz, Transcoder};
    use myrtio_dmx_light::worker::{Action, WorkerQueue};
    use myrtio_dmx_light::{Duration, Instant};

    type Mutex = CriticalSectionRawMutex;
    type Store<'a> = ConfigStore<'a, Mutex, NorFlashLog<RamFlash<1024>>>;

    const FRAME: usize = MAX_LEDS_PER_CHANNEL * 24 + 600;

    const SETTINGS: StoreSettings = StoreSettings {
        file_id: 0x0C0F,
        coalesce_delay: Duration::from_millis(1),
        retry_backoff: Duration::from_millis(1),
    };

    fn new_store<'a>() -> Store<'a> {
        ConfigStore::new(NorFlashLog::new(RamFlash::new(), 0, 512).unwrap(), SETTINGS)
    }

    /// Records every transmitted frame and completes transfers at once
    #[derive(Default)]
    struct MockTransport<'a> {
        queued: Option<OutputBuffer<'a>>,
        complete: Option<&'a SendComplete>,
        sent: Vec<(usize, Vec<u8>)>,
    }

    impl<'a> LedTransport<'a> for MockTransport<'a> {
        type Error = ();

        fn bind_completion(&mut self, complete: &'a SendComplete) {
            self.complete = Some(complete);
        }

        fn set_buffer(
            &mut self,
            buffer: OutputBuffer<'a>,
        ) -> Result<Option<OutputBuffer<'a>>, Self::Error> {
            Ok(self.queued.replace(buffer))
        }

        fn send(&mut self) -> Result<(), Self::Error> {
            let frame = self.queued.as_ref().ok_or(())?.as_slice();
            self.sent.push((frame.as_ptr() as usize, frame.to_vec()));
            if let Some(complete) = self.complete {
                complete.signal();
            }
            Ok(())
        }
    }

    /// Takes buffers but never reports a finished transfer
    #[derive(Default)]
    struct StalledTransport<'a> {
        queued: Option<OutputBuffer<'a>>,
        sends: usize,
    }

    impl<'a> LedTransport<'a> for StalledTransport<'a> {
        type Error = ();

        fn bind_completion(&mut self, _complete: &'a SendComplete) {}

        fn set_buffer(
            &mut self,
            buffer: OutputBuffer<'a>,
        ) -> Result<Option<OutputBuffer<'a>>, Self::Error> {
            Ok(self.queued.replace(buffer))
        }

        fn send(&mut self) -> Result<(), Self::Error> {
            self.sends += 1;
            Ok(())
        }
    }

    fn decode_pulses(bytes: &[u8]) -> Vec<bool> {
        let mut bits = Vec::new();
        let mut run = 0;
        for byte in bytes {
            for bit in (0..8).rev() {
                if byte & (1 << bit) != 0 {
                    run += 1;
                } else if run > 0 {
                    bits.push(run >= 4);
                    run = 0;
                }
            }
        }
        bits
    }

    fn decode_colors(frame: &[u8]) -> Vec<Rgb> {
        decode_pulses(frame)
            .chunks_exact(24)
            .map(|bits| {
                let byte = |range: core::ops::Range<usize>| {
                    bits[range].iter().fold(0u8, |acc, bit| acc << 1 | u8::from(*bit))
                };
                Rgb::new(byte(8..16), byte(0..8), byte(16..24))
            })
            .collect()
    }

    #[test]
    fn test_dmx_values_reach_the_strip() {
        let mut first = [0u8; FRAME];
        let mut second = [0u8; FRAME];
        let shared = ChannelShared::<Mutex>::new(0);
        let program = DefaultProgram;
        let actions = WorkerQueue::<Mutex>::new();
        let ingest = DmxIngest::<Mutex>::new(Uid::new(1, 2));
        ingest.subscribe(&shared).unwrap();
        ingest.set_subscription(1, 3).unwrap();
        let store = new_store();
        store.subscribe(ParamId::Led0Render, &shared).unwrap();

        let buffers = DoubleBuffer::new(OutputBuffer::zeroed(&mut first), OutputBuffer::zeroed(&mut second));
        let mut channel = RenderChannel::<_, _, Spi8Mhz>::new(
            &shared,
            &actions,
            MockTransport::default(),
            buffers,
            &program,
            ChannelSettings::default(),
        );

        block_on(async {
            let config = RenderConfig {
                n_leds: 1,
                ..RenderConfig::DEFAULT
            };
            store.set(LED_RENDER[0], &config).await.unwrap();
            channel.start(&store).await.unwrap();
            channel.cycle().await.unwrap();
            ingest.handle_frame(&[0, 10, 20, 30]);
            channel.cycle().await.unwrap();
            channel.cycle().await.unwrap();
        });

        let sent = &channel.transport().sent;
        assert_eq!(sent.len(), 3);

        // Startup and reset frames blank the whole strip
        for (_, frame) in &sent[..2] {
            assert_eq!(frame.len(), Spi8Mhz::frame_size(MAX_LEDS_PER_CHANNEL));
            assert_eq!(decode_colors(frame), vec![Rgb::new(0, 0, 0); MAX_LEDS_PER_CHANNEL]);
        }

        let frame = &sent[2].1;
        assert_eq!(frame.len(), 624);
        assert!(frame[..300].iter().all(|byte| *byte == 0));
        assert!(frame[324..].iter().all(|byte| *byte == 0));
        assert_eq!(decode_colors(frame), vec![Rgb::new(10, 20, 30)]);
    }

    #[test]
    fn test_empty_strip_sends_only_resets() {
        let mut first = [0u8; FRAME];
        let mut second = [0u8; FRAME];
        let shared = ChannelShared::<Mutex>::new(1);
        let actions = WorkerQueue::<Mutex>::new();
        let store = new_store();

        let buffers = DoubleBuffer::new(OutputBuffer::new(&mut first), OutputBuffer::new(&mut second));
        let mut channel = RenderChannel::<_, _, Spi8Mhz>::new(
            &shared,
            &actions,
            MockTransport::default(),
            buffers,
            &DefaultProgram,
            ChannelSettings::default(),
        );

        block_on(async {
            let config = RenderConfig {
                n_leds: 0,
                ..RenderConfig::DEFAULT
            };
            store.set(LED_RENDER[1], &config).await.unwrap();
            channel.start(&store).await.unwrap();
            for _ in 0..3 {
                channel.cycle().await.unwrap();
            }
        });

        let sent = &channel.transport().sent;
        assert_eq!(sent[2].1, vec![0u8; 600]);
    }

    #[test]
    fn test_buffers_alternate() {
        let mut first = [0u8; FRAME];
        let mut second = [0u8; FRAME];
        let shared = ChannelShared::<Mutex>::new(0);
        let actions = WorkerQueue::<Mutex>::new();
        let store = new_store();

        let buffers = DoubleBuffer::new(OutputBuffer::zeroed(&mut first), OutputBuffer::zeroed(&mut second));
        let mut channel = RenderChannel::<_, _, Spi8Mhz>::new(
            &shared,
            &actions,
            MockTransport::default(),
            buffers,
            &NoProgram,
            ChannelSettings::default(),
        );

        block_on(async {
            channel.start(&store).await.unwrap();
            assert_eq!(channel.buffers_held(), 1);
            for _ in 0..10 {
                channel.cycle().await.unwrap();
                assert_eq!(channel.buffers_held(), 1);
            }
        });

        let sent = &channel.transport().sent;
        assert_eq!(sent.len(), 10);
        let (even, odd) = (sent[0].0, sent[1].0);
        assert_ne!(even, odd);
        for (index, (addr, _)) in sent.iter().enumerate() {
            assert_eq!(*addr, if index % 2 == 0 { even } else { odd });
        }
    }

    /// Switches to HSV on refresh
    struct HsvProgram;

    impl UserProgram for HsvProgram {
        fn init(&self, _chan: &mut LedChan<'_>) {}

        fn refresh(&self, chan: &mut LedChan<'_>) {
            chan.color_mode = ColorMode::Hsv;
        }
    }

    impl ProgramSource for HsvProgram {
        fn with_program(
            &self,
            f: &mut dyn FnMut(&dyn UserProgram),
        ) -> Result<(), myrtio_dmx_light::program::ProgramUnavailable> {
            f(self);
            Ok(())
        }
    }

    #[test]
    fn test_program_color_mode_goes_through_worker() {
        let mut first = [0u8; FRAME];
        let mut second = [0u8; FRAME];
        let shared = ChannelShared::<Mutex>::new(2);
        let actions = WorkerQueue::<Mutex>::new();
        let store = new_store();

        let buffers = DoubleBuffer::new(OutputBuffer::zeroed(&mut first), OutputBuffer::zeroed(&mut second));
        let mut channel = RenderChannel::<_, _, Spi8Mhz>::new(
            &shared,
            &actions,
            MockTransport::default(),
            buffers,
            &HsvProgram,
            ChannelSettings::default(),
        );

        // Queue full: the request waits for a free slot
        while actions.try_send(Action::EraseConfig).is_ok() {}

        block_on(async {
            channel.start(&store).await.unwrap();
            channel.cycle().await.unwrap();
            assert_eq!(shared.config().color_mode, ColorMode::Rgb);

            channel.cycle().await.unwrap();
            assert_eq!(shared.config().color_mode, ColorMode::Hsv);
            assert!(actions.is_full());

            assert_eq!(actions.try_receive(), Ok(Action::EraseConfig));
            channel.cycle().await.unwrap();
        });

        let mut last = None;
        while let Ok(action) = actions.try_receive() {
            last = Some(action);
        }
        assert_eq!(
            last,
            Some(Action::SetColorMode {
                channel: 2,
                mode: ColorMode::Hsv
            })
        );
    }

    #[test]
    fn test_render_config_change_resets_strip() {
        let shared = ChannelShared::<Mutex>::new(0);
        assert!(shared.snapshot().reset);
        assert!(!shared.snapshot().reset);

        let store = new_store();
        store.subscribe(ParamId::Led0Render, &shared).unwrap();
        block_on(async {
            let config = RenderConfig {
                refresh_msec: 40,
                ..RenderConfig::DEFAULT
            };
            store.set(LED_RENDER[0], &config).await.unwrap();
            store.flush().await.unwrap();
            assert_eq!(shared.config(), config);
            assert!(!shared.snapshot().reset);

            store
                .set(LED_RENDER[0], &RenderConfig { n_leds: 5, ..config })
                .await
                .unwrap();
            store.flush().await.unwrap();
            assert!(shared.snapshot().reset);
        });

        shared.reset();
        assert!(shared.snapshot().reset);
        ChannelShared::reset_all(&[&shared]);
        assert!(shared.snapshot().reset);
    }

    fn render_once(renderer: &mut PixelRenderer<'_>, props: &RenderProps) -> Vec<Rgb> {
        let mut memory = [0u8; FRAME];
        let mut output = OutputBuffer::new(&mut memory);
        renderer
            .render(props, &mut Transcoder::<Spi8Mhz>::new(&mut output))
            .unwrap();
        decode_colors(output.as_slice())
    }

    #[test]
    fn test_control_commands() {
        let shared = ChannelShared::<Mutex>::new(0);
        let mut renderer = PixelRenderer::new(0, Curve::Linear, &NoProgram);

        assert_eq!(shared.control(&[0x01, 1, 0, 2, 0, 7, 8, 9]), Ok(()));
        assert_eq!(shared.control(&[0x10, 3, 0]), Ok(()));
        assert_eq!(shared.control(&[0x11, 1, 2, 3, 4, 5, 6, 7]), Ok(()));
        assert_eq!(shared.control(&[0x02]), Err(ControlError::Malformed));
        assert_eq!(shared.control(&[0x01, 1, 0]), Err(ControlError::Malformed));

        let mut props = shared.snapshot();
        props.config.n_leds = 6;
        assert_eq!(props.commands.len(), 3);
        let colors = render_once(&mut renderer, &props);
        assert_eq!(colors.len(), MAX_LEDS_PER_CHANNEL);
        assert_eq!(
            &colors[..6],
            &[
                Rgb::new(0, 0, 0),
                Rgb::new(7, 8, 9),
                Rgb::new(7, 8, 9),
                Rgb::new(1, 2, 3),
                Rgb::new(4, 5, 6),
                Rgb::new(0, 0, 0),
            ]
        );

        // Sequential writes continue where the last one stopped
        shared.control(&[0x11, 9, 9, 9]).unwrap();
        let mut props = shared.snapshot();
        props.config.n_leds = 6;
        assert!(!props.reset);
        let colors = render_once(&mut renderer, &props);
        assert_eq!(colors.len(), 6);
        assert_eq!(colors[5], Rgb::new(9, 9, 9));

        shared.control(&[0x00]).unwrap();
        let mut props = shared.snapshot();
        props.config.n_leds = 6;
        let colors = render_once(&mut renderer, &props);
        assert_eq!(colors, vec![Rgb::new(0, 0, 0); MAX_LEDS_PER_CHANNEL]);
        assert!(renderer.pixels().iter().all(|pixel| *pixel == [0; 3]));
    }

    #[test]
    fn test_control_queue_limit() {
        let shared = ChannelShared::<Mutex>::new(0);
        for _ in 0..4 {
            shared.control(&[0x00]).unwrap();
        }
        assert_eq!(shared.control(&[0x00]), Err(ControlError::QueueFull));
        assert_eq!(
            ControlCommand::parse(&[0x10, 0x34, 0x12]),
            Ok(ControlCommand::SetSeqOffset(0x1234))
        );
    }

    #[test]
    fn test_pixels_use_color_mode() {
        let mut renderer = PixelRenderer::new(0, Curve::Linear, &NoProgram);
        let shared = ChannelShared::<Mutex>::new(0);
        shared.control(&[0x01, 0, 0, 1, 0, 170, 255, 255]).unwrap();
        let mut props = shared.snapshot();
        props.reset = false;
        props.config = RenderConfig {
            n_leds: 1,
            refresh_msec: 20,
            color_mode: ColorMode::Hsv,
        };
        assert_eq!(render_once(&mut renderer, &props), vec![Rgb::new(0, 0, 255)]);
    }

    #[test]
    fn test_scheduler_drift_reset() {
        let mut scheduler = CycleScheduler::new(Duration::from_millis(20));
        let timing = scheduler.tick(Instant::from_millis(1000));
        assert_eq!(timing.next_deadline, Instant::from_millis(1020));
        assert_eq!(timing.sleep_duration, Duration::from_millis(20));

        let timing = scheduler.tick(Instant::from_millis(1010));
        assert_eq!(timing.next_deadline, Instant::from_millis(1040));
        assert_eq!(timing.sleep_duration, Duration::from_millis(30));

        // Late, but within two periods: catch up
        let timing = scheduler.tick(Instant::from_millis(1075));
        assert_eq!(timing.next_deadline, Instant::from_millis(1060));
        assert_eq!(timing.sleep_duration, Duration::from_millis(0));

        // Too far behind: start over from now
        let timing = scheduler.tick(Instant::from_millis(1200));
        assert_eq!(timing.next_deadline, Instant::from_millis(1220));
    }

    #[test]
    fn test_default_program() {
        let mut pixels = [[1u8; 3]; 4];
        let mut chan = LedChan {
            pixels: &mut pixels,
            dmx_vals: &[10, 20, 30, 2],
            id: 0,
            color_mode: ColorMode::Rgb,
            refresh_msec: 20,
            n_leds: 2,
        };
        DefaultProgram.refresh(&mut chan);
        assert_eq!(chan.color_mode, ColorMode::Hsl);
        assert_eq!(pixels, [[10, 20, 30], [10, 20, 30], [1, 1, 1], [1, 1, 1]]);

        let mut chan = LedChan {
            pixels: &mut pixels,
            dmx_vals: &[10, 20, 30, 7],
            id: 0,
            color_mode: ColorMode::Hsv,
            refresh_msec: 20,
            n_leds: 3,
        };
        DefaultProgram.init(&mut chan);
        assert_eq!(chan.color_mode, ColorMode::Rgb);
        assert_eq!(pixels, [[0; 3], [0; 3], [0; 3], [1, 1, 1]]);
    }

    #[test]
    fn test_missed_completion_is_not_fatal() {
        let mut first = [0u8; FRAME];
        let mut second = [0u8; FRAME];
        let shared = ChannelShared::<Mutex>::new(0);
        let actions = WorkerQueue::<Mutex>::new();
        let store = new_store();

        let buffers = DoubleBuffer::new(OutputBuffer::zeroed(&mut first), OutputBuffer::zeroed(&mut second));
        let settings = ChannelSettings {
            send_timeout: Some(Duration::from_millis(2)),
            ..ChannelSettings::default()
        };
        let mut channel = RenderChannel::<_, _, Spi8Mhz>::new(
            &shared,
            &actions,
            StalledTransport::default(),
            buffers,
            &NoProgram,
            settings,
        );

        block_on(async {
            channel.start(&store).await.unwrap();
            for _ in 0..3 {
                assert!(channel.cycle().await.is_ok());
                assert_eq!(channel.buffers_held(), 1);
            }
        });
        assert_eq!(channel.transport().sends, 3);
        assert!(channel.transport().queued.is_some());
    }

    #[test]
    fn test_out_of_range_render_config_is_ignored() {
        let mut first = [0u8; FRAME];
        let mut second = [0u8; FRAME];
        let shared = ChannelShared::<Mutex>::new(0);
        let actions = WorkerQueue::<Mutex>::new();
        let store = new_store();
        store.subscribe(ParamId::Led0Render, &shared).unwrap();

        let buffers = DoubleBuffer::new(OutputBuffer::zeroed(&mut first), OutputBuffer::zeroed(&mut second));
        let mut channel = RenderChannel::<_, _, Spi8Mhz>::new(
            &shared,
            &actions,
            MockTransport::default(),
            buffers,
            &NoProgram,
            ChannelSettings::default(),
        );

        block_on(async {
            // Zero refresh period stored behind the worker's back
            store
                .set_raw(ParamId::Led0Render, &[1, 0, 4, 0, 0, 0, 0, 0])
                .await
                .unwrap();
            channel.start(&store).await.unwrap();
            assert_eq!(shared.config(), RenderConfig::DEFAULT);
            assert_eq!(store.get(LED_RENDER[0]).await, Ok(RenderConfig::DEFAULT));
            store.flush().await.unwrap();

            let config = RenderConfig {
                n_leds: 4,
                refresh_msec: 40,
                color_mode: ColorMode::Rgb,
            };
            store.set(LED_RENDER[0], &config).await.unwrap();
            store.flush().await.unwrap();
            assert_eq!(shared.config(), config);

            store
                .set_raw(ParamId::Led0Render, &[1, 0, 4, 0, 0, 0, 0, 0])
                .await
                .unwrap();
            store.flush().await.unwrap();
            assert_eq!(shared.config(), config);

            let deadline = channel.cycle().await.unwrap();
            assert!(deadline > Instant::now());
        });
    }

    #[test]
    fn test_render_task_waits_for_resume() {
        let mut first = [0u8; FRAME];
        let mut second = [0u8; FRAME];
        let shared = ChannelShared::<Mutex>::new(0);
        let other = ChannelShared::<Mutex>::new(1);
        let actions = WorkerQueue::<Mutex>::new();
        let store = new_store();

        let buffers = DoubleBuffer::new(OutputBuffer::zeroed(&mut first), OutputBuffer::zeroed(&mut second));
        let mut channel = RenderChannel::<_, _, Spi8Mhz>::new(
            &shared,
            &actions,
            MockTransport::default(),
            buffers,
            &NoProgram,
            ChannelSettings::default(),
        );

        {
            let mut run = pin!(channel.run(&store));
            assert!(poll_once(run.as_mut()).is_pending());
        }
        assert!(channel.transport().sent.is_empty());

        ChannelShared::resume_all(&[&shared, &other]);
        {
            let mut run = pin!(channel.run(&store));
            assert!(poll_once(run.as_mut()).is_pending());
        }
        assert_eq!(channel.transport().sent.len(), 1);
    }
}
