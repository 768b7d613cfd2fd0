use anyhow::{Context, Result};
use smartmirrord::availability::DisplayAvailabilityController;
use smartmirrord::config::Config;
use smartmirrord::dispatch::LineDispatcher;
use smartmirrord::hardware::gpio::{GpiodIrOutputLine, GpiodPowerStatusLine};
use smartmirrord::hardware::ir::IrEmitter;
use smartmirrord::hardware::uart::UartTransport;
use smartmirrord::http;
use smartmirrord::ir_service::IrCommandService;
use smartmirrord::model::Timing;
use smartmirrord::motion::{MotionSource, NullFrameSource};
use smartmirrord::policy::{DisplayPolicyScheduler, SystemClock};
use smartmirrord::power::PowerDebouncer;
use smartmirrord::videomute::VideoMuteFsm;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
};

/// Samsung-family command table for the reference panel remote. The wire
/// prefix is fixed per vendor; only the low 16 bits vary per button.
fn default_ir_commands() -> BTreeMap<String, u16> {
    let mut commands = BTreeMap::new();
    commands.insert("power".to_string(), 0x0002);
    commands.insert("mute".to_string(), 0x000f);
    commands.insert("source".to_string(), 0x0001);
    commands.insert("vol_up".to_string(), 0x0007);
    commands.insert("vol_down".to_string(), 0x000b);
    commands.insert("channel_up".to_string(), 0x0012);
    commands.insert("channel_down".to_string(), 0x0013);
    commands
}

fn init_logging(config: &Config) {
    let default_directive: tracing_subscriber::filter::Directive = config
        .log_level
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let mut env_filter = EnvFilter::builder()
        .with_default_directive(default_directive)
        .from_env_lossy();
    if config.uart_debug {
        env_filter =
            env_filter.add_directive("smartmirrord::hardware::uart=debug".parse().unwrap());
    }

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.log_to_file {
        let log_path = std::path::Path::new(&config.log_file_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or_else(|| std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("smartmirrord.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // leaked: the guard must live for the process lifetime to flush on exit
        Box::leak(Box::new(guard));
        registry
            .with(config.log_to_console.then(|| fmt::layer()))
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();
    } else {
        registry.with(config.log_to_console.then(|| fmt::layer())).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    init_logging(&config);
    info!("smartmirrord starting up");

    let power_line = Arc::new(
        GpiodPowerStatusLine::open(&config.gpio_chip_path, config.gpio_power_status_pin)
            .context("failed to open power-status GPIO line")?,
    );
    let ir_line = Arc::new(
        GpiodIrOutputLine::open(&config.gpio_chip_path, config.gpio_ir_input_pin)
            .context("failed to open IR output GPIO line")?,
    );

    let uart_port = tokio_serial::new(&config.uart_port, config.uart_baudrate)
        .open_native_async()
        .context("failed to open UART serial port")?;

    let timing = Timing::default();

    let ir_emitter = IrEmitter::new(ir_line, smartmirror_proto::IrTiming::SAMSUNG);
    let ir_service = Arc::new(IrCommandService::new(
        ir_emitter,
        smartmirror_proto::PREFIX_SAMSUNG,
        default_ir_commands(),
    ));

    let uart = Arc::new(UartTransport::new(uart_port));
    let dispatcher = LineDispatcher::new();

    let fsm = VideoMuteFsm::new(uart.clone(), timing.transition_timeout);
    dispatcher.register_handler(fsm.clone());

    let uart_to_dispatcher = dispatcher.clone();
    let uart_listener_sub = uart.register_listener(move |line| uart_to_dispatcher.dispatch(&line));

    let power_debouncer = PowerDebouncer::new(power_line, timing.power_stability_window);

    let availability = DisplayAvailabilityController::new(
        ir_service.clone(),
        timing.power_off_delay,
        timing.power_on_timeout,
    );

    let policy = DisplayPolicyScheduler::new(
        fsm.clone(),
        SystemClock,
        config.schedule.clone(),
        config.display_policy_timeout,
    );

    let power_on_availability = availability.clone();
    let power_on_fsm = fsm.clone();
    let power_on_policy = policy.clone();
    let power_on_sub = power_debouncer.register_on_power_on(move |_| {
        power_on_availability.on_power_on();
        power_on_fsm.on_power_on();
        power_on_policy.on_power_on();
    });

    let power_off_availability = availability.clone();
    let power_off_fsm = fsm.clone();
    let power_off_policy = policy.clone();
    let power_off_sub = power_debouncer.register_on_power_off(move |_| {
        power_off_availability.on_power_off();
        power_off_fsm.on_power_off();
        power_off_policy.on_power_off();
    });

    let motion_source = MotionSource::new(
        Arc::new(NullFrameSource::new(
            config.motion_width,
            config.motion_height,
            std::time::Duration::from_millis(200),
        )),
        config.motion_threshold,
        config.motion_cooldown,
    );
    let motion_policy = policy.clone();
    let motion_sub = motion_source.register_on_motion(move |_| motion_policy.on_motion());

    // startup order: leaves first.
    ir_service.start();
    uart.start().await.context("failed to start UART transport")?;
    dispatcher.start();
    fsm.start();
    power_debouncer
        .start()
        .await
        .context("failed to start power debouncer")?;
    policy.start();
    motion_source.start().await;

    let http_addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
    let http_ir = ir_service.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http::serve(http_ir, http_addr).await {
            error!(error = %e, "http remote exited with error");
        }
    });

    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }

    info!("shutting down");
    http_task.abort();
    // shutdown in reverse startup order.
    motion_source.stop().await;
    policy.stop();
    power_debouncer.stop().await;
    fsm.stop();
    dispatcher.stop();
    uart.stop().await;
    ir_service.stop();

    drop((uart_listener_sub, power_on_sub, power_off_sub, motion_sub));
    info!("smartmirrord exited cleanly");
    Ok(())
}
