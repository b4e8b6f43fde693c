use clap::Parser;
use embassy_executor::{Executor, Spawner};
use embassy_time::{Duration, Ticker, Timer};
use embedded_can::{Frame, Id, StandardId, nb::Can};
use pdcan_core::config::NodeConfig;
use pdcan_core::mk_static;
use pdcan_core::utils::connection::frame_decoder::{DecodedCommand, encode_frame};
use pdcan_core::utils::connection::wire::{FEEDBACK_IDS, POWER_REPORT_ID, decode_quad, encode_quad};
use pdcan_core::utils::controllers::{ControlLoop, ControlShared, MOTOR_COUNT, MotorSlot};
use pdcan_core::utils::{BridgeController, ControllerNode};
use static_cell::StaticCell;
use std::path::PathBuf;
use tracing::{error, info};

mod bus;
use bus::{BusPort, NodeId, PipeSerial, SerialLink, SimFrame};

#[derive(Parser)]
#[clap(version = "1.0", about = "Runs the bridge and controller nodes against a simulated bus")]
struct Opts {
    /// Motor power fractions sent by the host, in slot order
    #[clap(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0.5,-0.5,0.25,0")]
    fractions: Vec<f32>,
    /// Tag byte carried in each serial frame
    #[clap(long, default_value_t = 1)]
    tag: u8,
    /// How long to simulate, in milliseconds
    #[clap(long, default_value_t = 500)]
    duration_ms: u64,
    /// Interval between host serial frames, in milliseconds
    #[clap(long, default_value_t = 100)]
    frame_interval_ms: u64,
    /// Largest number of serial bytes the bridge sees per read
    #[clap(long, default_value_t = 7)]
    chunk: usize,
    /// Response lag of the simulated motors, in plant ticks
    #[clap(long, default_value_t = 4)]
    plant_lag: i32,
    /// JSON file with `NodeConfig` overrides
    #[clap(long)]
    config: Option<PathBuf>,
}

static SERIAL_LINK: SerialLink = SerialLink::new();

#[embassy_executor::task]
async fn control_task(control: ControlLoop<'static>) -> ! {
    control.run().await
}

#[embassy_executor::task]
async fn controller_task(mut node: ControllerNode<'static, BusPort>) -> ! {
    node.run().await
}

#[embassy_executor::task]
async fn bridge_task(mut bridge: BridgeController<BusPort, PipeSerial>) -> ! {
    bridge.run().await
}

/// Host side of the serial link: writes the same command periodically.
#[embassy_executor::task]
async fn host_task(command: DecodedCommand, interval: Duration) -> ! {
    let frame = encode_frame(&command);
    let mut ticker = Ticker::every(interval);
    loop {
        let mut rest = &frame[..];
        while !rest.is_empty() {
            let n = SERIAL_LINK.write(rest).await;
            rest = &rest[n..];
        }
        ticker.next().await;
    }
}

/// First-order motor model: each speed moves toward the last reported power and
/// is published on its encoder id every millisecond.
#[embassy_executor::task]
async fn plant_task(mut port: BusPort, lag: i32) -> ! {
    let mut power = [0i16; MOTOR_COUNT];
    let mut speed = [0i16; MOTOR_COUNT];
    let mut ticker = Ticker::every(Duration::from_millis(1));
    loop {
        while let Ok(frame) = port.receive() {
            if !matches!(frame.id(), Id::Standard(id) if id.as_raw() == POWER_REPORT_ID) {
                continue;
            }
            if let Some(report) = decode_quad(frame.data()) {
                power = report;
            }
        }

        for (s, p) in speed.iter_mut().zip(power) {
            *s = (i32::from(*s) + (i32::from(p) - i32::from(*s)) / lag) as i16;
        }

        for &(id, slot) in FEEDBACK_IDS.iter() {
            let bytes = encode_quad([0, speed[slot.index()], 0, 0]);
            let frame = StandardId::new(id).and_then(|id| SimFrame::new(id, &bytes));
            if let Some(frame) = frame {
                let _ = port.transmit(&frame);
            }
        }
        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn main_task(spawner: Spawner, opts: Opts, config: NodeConfig) {
    let mut motor_fraction = [0.0f32; MOTOR_COUNT];
    for (dst, src) in motor_fraction.iter_mut().zip(&opts.fractions) {
        *dst = *src;
    }

    let shared: &'static ControlShared = mk_static!(ControlShared, ControlShared::new(config.gains));

    spawner
        .spawn(control_task(ControlLoop::new(shared, config.tick_period())))
        .unwrap();
    spawner
        .spawn(controller_task(ControllerNode::new(BusPort::new(NodeId::Controller), shared)))
        .unwrap();
    spawner
        .spawn(bridge_task(BridgeController::new(
            BusPort::new(NodeId::Bridge),
            PipeSerial::new(&SERIAL_LINK, opts.chunk),
        )))
        .unwrap();
    spawner
        .spawn(plant_task(BusPort::new(NodeId::Plant), opts.plant_lag.max(1)))
        .unwrap();
    spawner
        .spawn(host_task(
            DecodedCommand {
                tag: opts.tag,
                motor_fraction,
            },
            Duration::from_millis(opts.frame_interval_ms.max(1)),
        ))
        .unwrap();

    info!(
        ?motor_fraction,
        tick_ms = config.tick_period_ms,
        can_bitrate = config.can_bitrate,
        serial_baud = config.serial_baud,
        "simulation started"
    );
    Timer::after(Duration::from_millis(opts.duration_ms)).await;

    let (targets, powers, measured) = shared.with_bank(|bank| {
        (
            bank.targets(),
            bank.powers(),
            MotorSlot::ALL.map(|slot| bank.state(slot).measured_speed),
        )
    });
    info!(
        ?targets,
        ?powers,
        ?measured,
        lost_frames = bus::lost_frames(),
        "simulation finished"
    );
    std::process::exit(0);
}

fn load_config(path: Option<&PathBuf>) -> Result<NodeConfig, String> {
    let config: NodeConfig = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            serde_json::from_str(&text).map_err(|e| format!("invalid config: {}", e))?
        }
        None => NodeConfig::default(),
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let opts: Opts = Opts::parse();
    if opts.fractions.len() != MOTOR_COUNT {
        error!(got = opts.fractions.len(), "expected {} motor fractions", MOTOR_COUNT);
        std::process::exit(2);
    }
    let config = match load_config(opts.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, opts, config)).unwrap();
    });
}
