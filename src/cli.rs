//! Console front end: flags, hotkeys and a status printer.

use anyhow::{Context, Result};
use autoclicky::config::{ClickButton, ClickConfig, DEFAULT_HUMANIZE_FRACTION, MIN_INTERVAL};
use autoclicky::hotkey::{Combo, HotkeyMatcher, DEFAULT_STOP_HOTKEY, DEFAULT_TOGGLE_HOTKEY};
use autoclicky::input::ClickerFactory;
use autoclicky::listener::{self, shared_matcher};
use autoclicky::{ClickError, Controller, Phase, StatusUpdate, StopCause};
use clap::{ArgAction, Parser};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "autoclicky", version, about = "Hotkey-controlled autoclicker.")]
pub struct Cli {
    /// Seconds between clicks (raised to 0.01 if smaller)
    #[arg(long, default_value_t = 0.2)]
    pub interval: f64,

    /// Random jitter: seconds (`0.05` = +/-50ms) or a fraction (`15%`)
    #[arg(long, default_value = "0")]
    pub jitter: JitterSpec,

    /// Humanize timing with +/-15% jitter (overrides --jitter)
    #[arg(long)]
    pub humanize: bool,

    /// Mouse button: left, right or middle
    #[arg(long, default_value = "left")]
    pub button: ClickButton,

    /// Auto-stop after this many seconds
    #[arg(long)]
    pub duration: Option<f64>,

    /// Hotkey to start/pause
    #[arg(long, default_value = DEFAULT_TOGGLE_HOTKEY)]
    pub toggle_hotkey: String,

    /// Hotkey to stop and exit
    #[arg(long, default_value = DEFAULT_STOP_HOTKEY)]
    pub stop_hotkey: String,

    /// Start clicking immediately instead of waiting for the toggle hotkey
    #[arg(long)]
    pub start: bool,

    /// Log clicks instead of moving the real mouse
    #[arg(long)]
    pub dry_run: bool,

    /// Open the settings window instead of running in the console
    #[arg(long)]
    pub gui: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// `--jitter` value: absolute seconds, or a fraction when suffixed with `%`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JitterSpec {
    Seconds(f64),
    Fraction(f64),
}

impl FromStr for JitterSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            let value: f64 = pct
                .trim()
                .parse()
                .map_err(|_| format!("invalid jitter percentage '{s}'"))?;
            Ok(JitterSpec::Fraction(value / 100.0))
        } else {
            let value: f64 = s.parse().map_err(|_| format!("invalid jitter '{s}'"))?;
            Ok(JitterSpec::Seconds(value))
        }
    }
}

impl Cli {
    /// Validates the flags into a run configuration.
    pub fn click_config(&self) -> autoclicky::Result<ClickConfig> {
        let mut interval = self.interval;
        if interval.is_finite() && interval > 0.0 && interval < MIN_INTERVAL.as_secs_f64() {
            warn!(requested = interval, "interval below minimum, using 0.01s");
            interval = MIN_INTERVAL.as_secs_f64();
        }

        let builder = ClickConfig::builder()
            .interval_secs(interval)
            .button(self.button)
            .duration_secs(self.duration);

        let builder = if self.humanize {
            builder.jitter_fraction(DEFAULT_HUMANIZE_FRACTION)
        } else {
            match self.jitter {
                JitterSpec::Seconds(s) => builder.jitter_secs(s),
                JitterSpec::Fraction(f) => builder.jitter_fraction(f),
            }
        };
        builder.build()
    }

    pub fn hotkeys(&self) -> autoclicky::Result<(Combo, Combo)> {
        Ok((Combo::parse(&self.toggle_hotkey)?, Combo::parse(&self.stop_hotkey)?))
    }
}

/// Runs until the scheduler reaches `Stopped` (stop hotkey, Ctrl-C, duration
/// elapsed or persistent input failure).
pub fn run(cli: &Cli, config: ClickConfig, factory: ClickerFactory) -> Result<()> {
    let (toggle_combo, stop_combo) = cli.hotkeys()?;

    let controller = Arc::new(Controller::new(factory)?);
    let (tx, rx) = crossbeam_channel::unbounded::<StatusUpdate>();
    controller.subscribe(Arc::new(tx));
    controller.configure(config)?;

    let mut matcher = HotkeyMatcher::new();
    {
        let controller = Arc::clone(&controller);
        matcher.register(toggle_combo, move || {
            if let Err(e) = controller.on_toggle() {
                warn!(error = %e, "toggle ignored");
            }
        });
    }
    {
        let controller = Arc::clone(&controller);
        matcher.register(stop_combo, move || controller.on_stop());
    }
    let key_listener = listener::spawn_or_degrade(shared_matcher(matcher));

    {
        let controller = Arc::clone(&controller);
        ctrlc::set_handler(move || controller.on_stop())
            .context("failed to install Ctrl-C handler")?;
    }

    println!("Autoclicker ready.");
    if key_listener.is_some() {
        println!("Toggle: {} | Stop: {}", cli.toggle_hotkey, cli.stop_hotkey);
    } else {
        println!("Hotkeys unavailable; press Ctrl-C to stop.");
    }

    if cli.start || key_listener.is_none() {
        controller.on_toggle()?;
    }

    let mut outcome = Ok(());
    for update in rx.iter() {
        match update {
            StatusUpdate::Phase(Phase::Running, _) => println!("Started clicking."),
            StatusUpdate::Phase(Phase::Paused, _) => println!("Paused clicking."),
            StatusUpdate::Phase(Phase::Stopped, cause) => {
                match cause {
                    Some(StopCause::DurationElapsed) => println!("Duration reached. Stopping."),
                    Some(StopCause::InputUnavailable) => {
                        outcome = Err(ClickError::input_unavailable(
                            "mouse clicks kept failing; run stopped",
                        ));
                    }
                    _ => println!("Stopped."),
                }
                break;
            }
            StatusUpdate::Phase(Phase::Idle, _) => {}
            StatusUpdate::Clicked(count) => tracing::trace!(count, "click"),
        }
    }

    if let Some(key_listener) = key_listener {
        key_listener.stop();
    }
    let status = controller.on_status_tick();
    controller.shutdown();
    info!(clicks = status.click_count, "exiting");
    println!("Total clicks: {}", status.click_count);

    outcome.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclicky::Jitter;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["autoclicky"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let config = cli.click_config().unwrap();
        assert_eq!(config.interval(), Duration::from_millis(200));
        assert_eq!(config.button(), ClickButton::Left);
        assert_eq!(config.jitter(), Jitter::None);
        assert_eq!(config.duration(), None);
        assert_eq!(cli.toggle_hotkey, "<ctrl>+<alt>+t");
        assert_eq!(cli.stop_hotkey, "<ctrl>+<alt>+s");
        assert!(cli.hotkeys().is_ok());
    }

    #[test]
    fn test_interval_floor() {
        let config = parse(&["--interval", "0.001"]).click_config().unwrap();
        assert_eq!(config.interval(), MIN_INTERVAL);
    }

    #[test]
    fn test_non_positive_interval_rejected() {
        let err = parse(&["--interval", "0"]).click_config().unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn test_huge_values_are_invalid_config() {
        for args in [["--interval", "1e20"], ["--duration", "1e20"], ["--jitter", "1e20"]] {
            let err = parse(&args).click_config().unwrap_err();
            assert!(err.is_invalid_config(), "{args:?}");
        }
    }

    #[test]
    fn test_jitter_forms() {
        let config = parse(&["--jitter", "0.05"]).click_config().unwrap();
        assert_eq!(config.jitter(), Jitter::Absolute(Duration::from_millis(50)));

        let config = parse(&["--jitter", "15%"]).click_config().unwrap();
        assert_eq!(config.jitter(), Jitter::Fraction(0.15));

        let config = parse(&["--jitter", "0.05", "--humanize"]).click_config().unwrap();
        assert_eq!(config.jitter(), Jitter::Fraction(DEFAULT_HUMANIZE_FRACTION));

        assert!(parse(&["--jitter", "150%"]).click_config().is_err());
        assert!(Cli::try_parse_from(["autoclicky", "--jitter", "lots"]).is_err());
    }

    #[test]
    fn test_button_and_duration() {
        let config = parse(&["--button", "middle", "--duration", "2.5"])
            .click_config()
            .unwrap();
        assert_eq!(config.button(), ClickButton::Middle);
        assert_eq!(config.duration(), Some(Duration::from_millis(2500)));

        assert!(Cli::try_parse_from(["autoclicky", "--button", "side"]).is_err());
        assert!(parse(&["--duration=-1"]).click_config().is_err());
    }

    #[test]
    fn test_bad_hotkey_is_invalid_config() {
        let cli = parse(&["--toggle-hotkey", "<hyper>+q"]);
        assert!(cli.hotkeys().unwrap_err().is_invalid_config());
    }
}
