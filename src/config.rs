//! Click run configuration.
//!
//! A [`ClickConfig`] is immutable once built and is only ever constructed
//! through [`ClickConfigBuilder::build`], which rejects non-positive intervals,
//! out-of-range jitter and values past [`MAX_INTERVAL`] or [`MAX_DURATION`].

use crate::error::{ClickError, Result};
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default CLI interval between clicks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Default interval shown in the window's interval field.
pub const DEFAULT_UI_INTERVAL_MS: u64 = 100;

/// Smallest interval the CLI accepts; shorter values are raised to it.
/// Absolute jitter never shortens an interval below this either.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Longest accepted interval, and the largest absolute jitter.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted auto-stop duration.
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Relative jitter used when humanizing without an explicit fraction.
pub const DEFAULT_HUMANIZE_FRACTION: f64 = 0.15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ClickButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl ClickButton {
    pub const ALL: [ClickButton; 3] = [ClickButton::Left, ClickButton::Right, ClickButton::Middle];

    pub fn as_str(self) -> &'static str {
        match self {
            ClickButton::Left => "left",
            ClickButton::Right => "right",
            ClickButton::Middle => "middle",
        }
    }
}

impl fmt::Display for ClickButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClickButton {
    type Err = ClickError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(ClickButton::Left),
            "right" => Ok(ClickButton::Right),
            "middle" => Ok(ClickButton::Middle),
            other => Err(ClickError::invalid_config(format!(
                "unsupported button '{other}' (expected left, right or middle)"
            ))),
        }
    }
}

/// Timing randomization applied to every interval.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Jitter {
    #[default]
    None,
    /// Symmetric relative jitter: the interval is scaled by a uniform
    /// factor in `[1 - f, 1 + f]`.
    Fraction(f64),
    /// Symmetric absolute jitter: the interval is shifted by a uniform
    /// offset in `[-d, +d]`, never dropping below [`MIN_INTERVAL`].
    Absolute(Duration),
}

impl Jitter {
    pub fn humanize() -> Self {
        Jitter::Fraction(DEFAULT_HUMANIZE_FRACTION)
    }

    pub fn is_enabled(&self) -> bool {
        match *self {
            Jitter::None => false,
            Jitter::Fraction(f) => f > 0.0,
            Jitter::Absolute(d) => !d.is_zero(),
        }
    }

    /// Returns the effective interval for one click.
    pub fn apply<R: Rng>(&self, interval: Duration, rng: &mut R) -> Duration {
        if !self.is_enabled() {
            return interval;
        }
        let base = interval.as_secs_f64();
        match *self {
            Jitter::None => interval,
            Jitter::Fraction(f) => {
                let multiplier = rng.gen_range((1.0 - f)..=(1.0 + f));
                Duration::try_from_secs_f64(base * multiplier).unwrap_or(interval)
            }
            Jitter::Absolute(d) => {
                let spread = d.as_secs_f64();
                let offset = rng.gen_range(-spread..=spread);
                Duration::try_from_secs_f64((base + offset).max(MIN_INTERVAL.as_secs_f64()))
                    .unwrap_or(interval)
            }
        }
    }
}

/// Parameters of one click run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClickConfig {
    interval: Duration,
    button: ClickButton,
    jitter: Jitter,
    duration: Option<Duration>,
}

impl ClickConfig {
    pub fn builder() -> ClickConfigBuilder {
        ClickConfigBuilder::default()
    }

    /// Nominal time between clicks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn button(&self) -> ClickButton {
        self.button
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Auto-stop limit measured from the start of the run; `None` runs until stopped.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn nominal_clicks_per_second(&self) -> f64 {
        1.0 / self.interval.as_secs_f64()
    }

    pub fn effective_interval<R: Rng>(&self, rng: &mut R) -> Duration {
        self.jitter.apply(self.interval, rng)
    }
}

/// Collects raw (possibly invalid) values and validates them in [`build`](Self::build).
#[derive(Clone, Debug)]
pub struct ClickConfigBuilder {
    interval_secs: f64,
    button: ClickButton,
    jitter_fraction: Option<f64>,
    jitter_secs: Option<f64>,
    duration_secs: Option<f64>,
}

impl Default for ClickConfigBuilder {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL.as_secs_f64(),
            button: ClickButton::Left,
            jitter_fraction: None,
            jitter_secs: None,
            duration_secs: None,
        }
    }
}

impl ClickConfigBuilder {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval_secs = interval.as_secs_f64();
        self
    }

    pub fn interval_secs(mut self, secs: f64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn interval_ms(mut self, ms: f64) -> Self {
        self.interval_secs = ms / 1000.0;
        self
    }

    pub fn button(mut self, button: ClickButton) -> Self {
        self.button = button;
        self
    }

    /// Relative jitter in `[0, 1)`. Replaces any absolute jitter.
    pub fn jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = Some(fraction);
        self.jitter_secs = None;
        self
    }

    /// Absolute ± jitter in seconds. Replaces any relative jitter.
    pub fn jitter_secs(mut self, secs: f64) -> Self {
        self.jitter_secs = Some(secs);
        self.jitter_fraction = None;
        self
    }

    pub fn jitter(self, jitter: Jitter) -> Self {
        match jitter {
            Jitter::None => self.no_jitter(),
            Jitter::Fraction(f) => self.jitter_fraction(f),
            Jitter::Absolute(d) => self.jitter_secs(d.as_secs_f64()),
        }
    }

    pub fn no_jitter(mut self) -> Self {
        self.jitter_fraction = None;
        self.jitter_secs = None;
        self
    }

    /// Enables the default relative jitter when `enabled`, disables jitter otherwise.
    pub fn humanize(self, enabled: bool) -> Self {
        if enabled {
            self.jitter_fraction(DEFAULT_HUMANIZE_FRACTION)
        } else {
            self.no_jitter()
        }
    }

    pub fn duration_secs(mut self, secs: Option<f64>) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn duration(mut self, duration: Option<Duration>) -> Self {
        self.duration_secs = duration.map(|d| d.as_secs_f64());
        self
    }

    pub fn build(self) -> Result<ClickConfig> {
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(ClickError::invalid_config(format!(
                "interval must be a positive number, got {}",
                self.interval_secs
            )));
        }
        let interval = bounded_secs("interval", self.interval_secs, MAX_INTERVAL)?;

        let jitter = match (self.jitter_fraction, self.jitter_secs) {
            (Some(f), _) => {
                if !f.is_finite() || !(0.0..1.0).contains(&f) {
                    return Err(ClickError::invalid_config(format!(
                        "jitter fraction must be in [0, 1), got {f}"
                    )));
                }
                if f == 0.0 { Jitter::None } else { Jitter::Fraction(f) }
            }
            (None, Some(s)) => {
                if !s.is_finite() || s < 0.0 {
                    return Err(ClickError::invalid_config(format!(
                        "jitter must be a non-negative number of seconds, got {s}"
                    )));
                }
                if s == 0.0 {
                    Jitter::None
                } else {
                    Jitter::Absolute(bounded_secs("jitter", s, MAX_INTERVAL)?)
                }
            }
            (None, None) => Jitter::None,
        };

        let duration = match self.duration_secs {
            Some(d) if !d.is_finite() || d <= 0.0 => {
                return Err(ClickError::invalid_config(format!(
                    "duration must be a positive number of seconds, got {d}"
                )));
            }
            Some(d) => Some(bounded_secs("duration", d, MAX_DURATION)?),
            None => None,
        };

        Ok(ClickConfig {
            interval,
            button: self.button,
            jitter,
            duration,
        })
    }
}

fn bounded_secs(what: &str, secs: f64, max: Duration) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(value) if value <= max => Ok(value),
        _ => Err(ClickError::invalid_config(format!(
            "{what} of {secs}s exceeds the limit of {}s",
            max.as_secs()
        ))),
    }
}

/// Parses the window's interval field (whole milliseconds).
pub fn parse_interval_ms(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    match trimmed.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        Ok(_) => Err(ClickError::invalid_config("interval must be greater than 0 ms")),
        Err(_) => Err(ClickError::invalid_config(format!(
            "'{trimmed}' is not a whole number of milliseconds"
        ))),
    }
}

/// Read-only clicks/sec display for an interval field: `1000 / ms`, 0 when unparsable.
pub fn nominal_clicks_per_second(text: &str) -> f64 {
    parse_interval_ms(text).map_or(0.0, |ms| 1000.0 / ms as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_builder_defaults() {
        let cfg = ClickConfig::builder().build().unwrap();
        assert_eq!(cfg.interval(), DEFAULT_INTERVAL);
        assert_eq!(cfg.button(), ClickButton::Left);
        assert_eq!(cfg.jitter(), Jitter::None);
        assert_eq!(cfg.duration(), None);
        assert!((cfg.nominal_clicks_per_second() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = ClickConfig::builder().interval_secs(bad).build().unwrap_err();
            assert!(err.is_invalid_config(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_bad_jitter_and_duration() {
        assert!(ClickConfig::builder().jitter_fraction(1.0).build().is_err());
        assert!(ClickConfig::builder().jitter_fraction(-0.1).build().is_err());
        assert!(ClickConfig::builder().jitter_secs(-0.5).build().is_err());
        assert!(ClickConfig::builder().duration_secs(Some(0.0)).build().is_err());
        assert!(ClickConfig::builder().duration_secs(Some(-3.0)).build().is_err());
    }

    #[test]
    fn test_rejects_values_too_large_for_a_duration() {
        let err = ClickConfig::builder().interval_secs(1e20).build().unwrap_err();
        assert!(err.is_invalid_config());
        let err = ClickConfig::builder().duration_secs(Some(1e20)).build().unwrap_err();
        assert!(err.is_invalid_config());
        let err = ClickConfig::builder().jitter_secs(1e20).build().unwrap_err();
        assert!(err.is_invalid_config());
        assert!(ClickConfig::builder().interval_ms(1e22).build().is_err());
    }

    #[test]
    fn test_limits_are_inclusive() {
        let cfg = ClickConfig::builder()
            .interval(MAX_INTERVAL)
            .jitter_secs(MAX_INTERVAL.as_secs_f64())
            .duration(Some(MAX_DURATION))
            .build()
            .unwrap();
        assert_eq!(cfg.interval(), MAX_INTERVAL);
        assert_eq!(cfg.duration(), Some(MAX_DURATION));

        let over = MAX_INTERVAL.as_secs_f64() + 1.0;
        assert!(ClickConfig::builder().interval_secs(over).build().is_err());
        let over = MAX_DURATION.as_secs_f64() + 1.0;
        assert!(ClickConfig::builder().duration_secs(Some(over)).build().is_err());
    }

    #[test]
    fn test_zero_jitter_disables_humanization() {
        let cfg = ClickConfig::builder().jitter_fraction(0.0).build().unwrap();
        assert_eq!(cfg.jitter(), Jitter::None);
        let cfg = ClickConfig::builder().jitter_secs(0.0).build().unwrap();
        assert_eq!(cfg.jitter(), Jitter::None);
        let cfg = ClickConfig::builder().humanize(true).build().unwrap();
        assert_eq!(cfg.jitter(), Jitter::Fraction(DEFAULT_HUMANIZE_FRACTION));
    }

    #[test]
    fn test_fraction_jitter_stays_in_bounds() {
        let interval = Duration::from_millis(100);
        let jitter = Jitter::Fraction(0.15);
        let mut rng = StdRng::seed_from_u64(7);
        let lo = interval.as_secs_f64() * 0.85 - 1e-9;
        let hi = interval.as_secs_f64() * 1.15 + 1e-9;
        for _ in 0..1000 {
            let eff = jitter.apply(interval, &mut rng).as_secs_f64();
            assert!(eff >= lo && eff <= hi, "{eff} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn test_absolute_jitter_is_floored() {
        let interval = Duration::from_millis(20);
        let jitter = Jitter::Absolute(Duration::from_millis(50));
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let eff = jitter.apply(interval, &mut rng);
            assert!(eff >= MIN_INTERVAL);
            assert!(eff <= Duration::from_millis(70) + Duration::from_micros(1));
        }
    }

    #[test]
    fn test_no_jitter_is_exact() {
        let cfg = ClickConfig::builder().interval_ms(250.0).build().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(cfg.effective_interval(&mut rng), Duration::from_millis(250));
    }

    #[test]
    fn test_button_parsing() {
        assert_eq!("Left".parse::<ClickButton>().unwrap(), ClickButton::Left);
        assert_eq!(" middle ".parse::<ClickButton>().unwrap(), ClickButton::Middle);
        assert_eq!("right".parse::<ClickButton>().unwrap(), ClickButton::Right);
        assert!("thumb".parse::<ClickButton>().is_err());
        assert_eq!(ClickButton::Middle.to_string(), "middle");
    }

    #[test]
    fn test_interval_field_parsing() {
        assert_eq!(parse_interval_ms(" 100 ").unwrap(), 100);
        assert!(parse_interval_ms("0").is_err());
        assert!(parse_interval_ms("abc").is_err());
        assert!(parse_interval_ms("-5").is_err());
        assert!((nominal_clicks_per_second("100") - 10.0).abs() < 1e-9);
        assert_eq!(nominal_clicks_per_second(""), 0.0);
    }
}
