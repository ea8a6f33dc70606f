//! Main loop
//!
//! Every read interval the input modules report into the engine, expired
//! elements are swept and the output modules draw the result.

use anyhow::Result;
use bwmon_core::{AppConfig, Engine, Flow, Subsystem};
use log::{debug, info};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

pub struct App {
    engine: Engine,
    input: Subsystem,
    output: Subsystem,
}

/// Both subsystems with every built-in module registered
pub fn subsystems() -> (Subsystem, Subsystem) {
    let mut input = Subsystem::new("input");
    let mut output = Subsystem::new("output");
    bwmon_sources::register_all(&mut input);
    bwmon_displayers::register_all(&mut output);
    (input, output)
}

impl App {
    /// Build the engine and enable the configured modules, falling back to
    /// the preferred ones when nothing was selected
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut engine = Engine::from_config(config)?;
        let (mut input, mut output) = subsystems();

        match config.input.as_deref() {
            Some(spec) => input.select(spec)?,
            None => input.select_default(bwmon_sources::PREFERRED)?,
        }
        match config.output.as_deref() {
            Some(spec) => output.select(spec)?,
            None => output.select_default(bwmon_displayers::PREFERRED)?,
        }

        input.init(&mut engine)?;
        output.init(&mut engine)?;

        Ok(Self {
            engine,
            input,
            output,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// One read pass followed by one draw pass
    pub fn tick(&mut self, now: Instant) -> Flow {
        self.engine.begin_tick(now);

        self.input.pre_poll(&mut self.engine);
        let input_flow = self.input.poll(&mut self.engine);
        self.input.post_poll(&mut self.engine);

        let removed = self.engine.end_tick();
        if removed > 0 {
            debug!("Swept {} elements", removed);
        }

        self.output.pre_poll(&mut self.engine);
        let output_flow = self.output.poll(&mut self.engine);
        self.output.post_poll(&mut self.engine);

        if input_flow == Flow::Quit || output_flow == Flow::Quit {
            Flow::Quit
        } else {
            Flow::Continue
        }
    }

    /// Run until an output module asks to quit or Ctrl-C is pressed
    pub async fn run(mut self) -> Result<()> {
        let period = Duration::from_secs_f64(self.engine.settings().read_interval);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!("Reading every {:?}", period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.tick(Instant::now()) == Flow::Quit {
                        info!("Output finished");
                        break;
                    }
                }
                result = &mut ctrl_c => {
                    result?;
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.output.shutdown(&mut self.engine);
        self.input.shutdown(&mut self.engine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(input: &str, output: &str) -> AppConfig {
        AppConfig {
            input: Some(input.to_string()),
            output: Some(output.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_ticks_feed_engine() {
        let mut app = App::new(&config("dummy:num=2;numgroups=1", "null")).unwrap();
        let start = Instant::now();

        for tick in 0..3 {
            assert_eq!(app.tick(start + Duration::from_secs(tick)), Flow::Continue);
        }

        assert_eq!(app.engine().graph().len(), 2);
        app.shutdown();
    }

    #[test]
    fn test_quit_after() {
        let mut app = App::new(&config("null", "json:quitafter=2")).unwrap();
        let start = Instant::now();

        assert_eq!(app.tick(start), Flow::Continue);
        assert_eq!(app.tick(start + Duration::from_secs(1)), Flow::Quit);
    }

    #[test]
    fn test_unknown_module() {
        assert!(App::new(&config("carrier-pigeon", "null")).is_err());
        assert!(App::new(&config("null", "ascii:colour=red")).is_err());
    }

    #[test]
    fn test_expired_elements_swept() {
        let mut config = config("dummy:num=1;numgroups=1", "null");
        config.settings.lifetime = 2.0;
        let mut app = App::new(&config).unwrap();

        app.tick(Instant::now());
        assert_eq!(app.engine().graph().len(), 1);

        // Stop reporting: an element nobody refreshes dies after its lifecycles
        app.input.shutdown(&mut app.engine);
        for _ in 0..3 {
            app.tick(Instant::now());
        }
        assert!(app.engine().graph().is_empty());
    }
}
