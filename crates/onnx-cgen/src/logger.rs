use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

/// Install a console logger at `level`, and log panics through it.
///
/// Fails when a logger is already installed.
pub fn init_log(level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("[{h({l})} - {f}:{L}] {m}{n}")))
        .build();
    let appender = Appender::builder().build("stdout", Box::new(stdout));

    let config = Config::builder()
        .appender(appender)
        .build(Root::builder().appender("stdout").build(level))?;
    log4rs::init_config(config)?;
    update_panic_hook();

    Ok(())
}

fn update_panic_hook() {
    let hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC => {info}");
        hook(info);
    }));
}
