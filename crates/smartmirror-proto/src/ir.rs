//! IR frame encoding: a 32-bit `(prefix << 16) | command` value, NEC-style
//! pulse-distance modulated, MSB first.

/// Samsung-family remote prefix used by the reference panel.
pub const PREFIX_SAMSUNG: u16 = 0x0707;

/// Logic level of a single pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// One pulse: a level held for a number of microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub level: Level,
    pub micros: u32,
}

/// Timing constants for one IR protocol variant. Carried as data, not
/// hardcoded into the bit-banging loop, so other remotes can be added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrTiming {
    pub leader_low_us: u32,
    pub leader_high_us: u32,
    pub bit_low_us: u32,
    pub bit_high_zero_us: u32,
    pub bit_high_one_us: u32,
    pub stop_low_us: u32,
}

impl IrTiming {
    /// Timing observed on Samsung-family panel remotes.
    pub const SAMSUNG: IrTiming = IrTiming {
        leader_low_us: 4500,
        leader_high_us: 4500,
        bit_low_us: 560,
        bit_high_zero_us: 560,
        bit_high_one_us: 1690,
        stop_low_us: 560,
    };
}

/// Combine a prefix and command into the 32-bit frame value.
pub fn frame_value(prefix: u16, command: u16) -> u32 {
    ((prefix as u32) << 16) | command as u32
}

/// Expand a frame value into its leader + 32 data bits + stop pulse train.
pub fn generate_pulses(timing: &IrTiming, value: u32) -> Vec<Pulse> {
    let mut pulses = Vec::with_capacity(2 + 32 * 2 + 1);
    pulses.push(Pulse {
        level: Level::Low,
        micros: timing.leader_low_us,
    });
    pulses.push(Pulse {
        level: Level::High,
        micros: timing.leader_high_us,
    });
    for i in (0..32).rev() {
        let bit = (value >> i) & 1;
        pulses.push(Pulse {
            level: Level::Low,
            micros: timing.bit_low_us,
        });
        let high_us = if bit == 1 {
            timing.bit_high_one_us
        } else {
            timing.bit_high_zero_us
        };
        pulses.push(Pulse {
            level: Level::High,
            micros: high_us,
        });
    }
    pulses.push(Pulse {
        level: Level::Low,
        micros: timing.stop_low_us,
    });
    pulses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_value_packs_prefix_and_command() {
        assert_eq!(frame_value(0x0707, 0x0002), 0x0707_0002);
    }

    #[test]
    fn test_pulse_count_is_leader_plus_32_bits_plus_stop() {
        let pulses = generate_pulses(&IrTiming::SAMSUNG, 0);
        assert_eq!(pulses.len(), 2 + 32 * 2 + 1);
    }

    #[test]
    fn test_bits_are_msb_first() {
        // value with only the top data bit set
        let value = 1u32 << 31;
        let pulses = generate_pulses(&IrTiming::SAMSUNG, value);
        // pulses[0..2] = leader, then pairs of (low, high) per bit
        let first_bit_high = pulses[3];
        assert_eq!(first_bit_high.level, Level::High);
        assert_eq!(first_bit_high.micros, IrTiming::SAMSUNG.bit_high_one_us);

        let second_bit_high = pulses[5];
        assert_eq!(second_bit_high.level, Level::High);
        assert_eq!(second_bit_high.micros, IrTiming::SAMSUNG.bit_high_zero_us);
    }

    #[test]
    fn test_leader_and_stop_pulses() {
        let pulses = generate_pulses(&IrTiming::SAMSUNG, 0);
        assert_eq!(
            pulses.first(),
            Some(&Pulse {
                level: Level::Low,
                micros: IrTiming::SAMSUNG.leader_low_us
            })
        );
        assert_eq!(
            pulses.last(),
            Some(&Pulse {
                level: Level::Low,
                micros: IrTiming::SAMSUNG.stop_low_us
            })
        );
    }
}
