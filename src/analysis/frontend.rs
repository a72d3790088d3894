//! Model of the acquisition firmware's signal chain.
//!
//! ```text
//! ADC counts ──► 16× average ──► volts ──► gain stage ──► IIR low-pass ──► bridge ──► Rx
//!                                (10 bit, 5 V)  -(v-1.65)/1.213   y=αy+(1-α)x    R(1+kv)/(1-kv)
//! ```
//!
//! Each processed reading becomes one log row with the seven channels of
//! [`Channel`](crate::data::model::Channel). The synthetic sample generator
//! runs the same chain, so generated logs carry the firmware's lag and
//! quantization.

use crate::data::model::CHANNEL_COUNT;

/// Constants of the conversion chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontEndConfig {
    pub oversampling: usize,
    pub adc_max_counts: f64,
    pub v_ref: f64,
    pub gain_offset: f64,
    pub gain_divisor: f64,
    /// IIR smoothing factor; closer to 1 is smoother.
    pub alpha: f64,
    pub bridge_r: f64,
    pub bridge_k: f64,
    /// Half-width of the latched reference band.
    pub band: f64,
    /// Milliseconds between readings.
    pub period_ms: u64,
}

impl Default for FrontEndConfig {
    fn default() -> Self {
        FrontEndConfig {
            oversampling: 16,
            adc_max_counts: 1023.0,
            v_ref: 5.0,
            gain_offset: 1.65,
            gain_divisor: 1.213,
            alpha: 0.9,
            bridge_r: 43.0,
            bridge_k: 0.61,
            band: 5.0,
            period_ms: 10,
        }
    }
}

impl FrontEndConfig {
    /// Bridge resistance for a filtered differential voltage.
    pub fn bridge_resistance(&self, voltage_diff: f64) -> f64 {
        let kv = self.bridge_k * voltage_diff;
        self.bridge_r * (kv + 1.0) / (1.0 - kv)
    }

    /// Differential voltage that yields `resistance`.
    pub fn bridge_voltage(&self, resistance: f64) -> f64 {
        (resistance - self.bridge_r) / (self.bridge_k * (resistance + self.bridge_r))
    }

    pub fn counts_to_voltage(&self, counts: f64) -> f64 {
        counts / self.adc_max_counts * self.v_ref
    }

    /// ADC input voltage whose amplified value is `voltage_diff`.
    pub fn input_voltage(&self, voltage_diff: f64) -> f64 {
        self.gain_offset - self.gain_divisor * voltage_diff
    }

    /// Fractional ADC counts for an input voltage, clamped to the ADC range.
    pub fn voltage_to_counts(&self, voltage: f64) -> f64 {
        (voltage / self.v_ref * self.adc_max_counts).clamp(0.0, self.adc_max_counts)
    }
}

/// One emitted reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontEndSample {
    pub voltage: f64,
    pub voltage_diff: f64,
    pub resistance: f64,
    pub r_bottom: f64,
    pub r_top: f64,
}

impl FrontEndSample {
    /// Values in log channel order.
    pub fn values(&self) -> [f64; CHANNEL_COUNT] {
        [
            self.voltage,
            self.voltage_diff,
            self.resistance,
            2.0,
            -2.0,
            self.r_bottom,
            self.r_top,
        ]
    }

    /// The row as the firmware prints it (without timestamp).
    pub fn format_row(&self) -> String {
        format!(
            "{:.6},{:.6},{:.2},2,-2,{:.0},{:.0}",
            self.voltage, self.voltage_diff, self.resistance, self.r_bottom, self.r_top
        )
    }
}

/// Stateful signal chain: filter memory and the latched reference band.
#[derive(Debug, Clone)]
pub struct FrontEnd {
    config: FrontEndConfig,
    filtered: f64,
    limits: Option<(f64, f64)>,
}

impl FrontEnd {
    pub fn new(config: FrontEndConfig) -> Self {
        FrontEnd {
            config,
            filtered: 0.0,
            limits: None,
        }
    }

    pub fn config(&self) -> &FrontEndConfig {
        &self.config
    }

    /// Process one burst of raw ADC readings.
    ///
    /// Filter state and the band latch advance on every call; `None` is
    /// returned for an empty burst or a zero input voltage, which the
    /// firmware does not print.
    pub fn process(&mut self, counts: &[u16]) -> Option<FrontEndSample> {
        if counts.is_empty() {
            return None;
        }
        let sum: u64 = counts.iter().map(|c| u64::from(*c)).sum();
        let average = sum as f64 / counts.len() as f64;
        self.process_voltage(self.config.counts_to_voltage(average))
    }

    pub fn process_voltage(&mut self, voltage: f64) -> Option<FrontEndSample> {
        let cfg = &self.config;
        let amplified = -(voltage - cfg.gain_offset) / cfg.gain_divisor;
        self.filtered = cfg.alpha * self.filtered + (1.0 - cfg.alpha) * amplified;

        let resistance = cfg.bridge_resistance(self.filtered);
        let band = cfg.band;
        let (r_bottom, r_top) = *self
            .limits
            .get_or_insert((resistance - band, resistance + band));

        if voltage == 0.0 {
            return None;
        }
        Some(FrontEndSample {
            voltage,
            voltage_diff: self.filtered,
            resistance,
            r_bottom,
            r_top,
        })
    }
}
