use chrono::Duration;

/// The configuration of the playback engine
#[derive(Debug, Clone)]
pub struct Config {
    /// How much is shaved off a segment before its advance is scheduled,
    /// so the timer never fires after listeners already ran out of audio
    pub advance_safety_margin: Duration,
    /// How long a member can stay silent before the liveness sweep evicts them
    pub liveness_timeout: Duration,
    /// How often the liveness sweep should run
    pub sweep_interval: Duration,
    /// Length of the shareable code every room is minted with
    pub join_code_length: usize,
}

impl Config {
    /// How long to wait before advancing past a segment of the given length.
    ///
    /// Clamped at zero, since a segment shorter than the safety margin is
    /// already due.
    pub fn advance_delay(&self, duration_to_complete: Duration) -> std::time::Duration {
        (duration_to_complete - self.advance_safety_margin)
            .to_std()
            .unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Masks scheduling and fan-out latency at segment boundaries
            advance_safety_margin: Duration::seconds(2),
            // Clients ping once a minute, so five minutes means they are gone
            liveness_timeout: Duration::minutes(5),
            sweep_interval: Duration::seconds(60),
            join_code_length: 8,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advance_delay_applies_the_safety_margin() {
        let config = Config::default();

        assert_eq!(
            config.advance_delay(Duration::seconds(180)),
            std::time::Duration::from_secs(178),
            "the margin should be shaved off the full segment"
        );
    }

    #[test]
    fn advance_delay_never_goes_negative() {
        let config = Config::default();

        assert_eq!(
            config.advance_delay(Duration::seconds(1)),
            std::time::Duration::ZERO,
            "segments shorter than the margin are due immediately"
        );

        assert_eq!(
            config.advance_delay(Duration::zero()),
            std::time::Duration::ZERO
        );
    }
}
