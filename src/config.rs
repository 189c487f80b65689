// Copyright (C) 2020  Kerem Çakırer

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::common::{Subvariant, Variant};

/// Every tunable of the core in one place. Durations are milliseconds.
#[derive(Clone, Debug)]
pub struct Config {
    session_ttl: u64,
    move_list_ttl: u64,
    cooldown: u64,
    rank_range: f64,
    crowded_rank_range: f64,
    crowded_queue_len: usize,
    long_wait: u64,
    fallback_delay: u64,
    idle_timeout: u64,
    cleanup_interval: u64,
    gc_interval: u64,
    timer_interval: u64,
    tournament_capacity: usize,
    tournament_variants: Vec<(Variant, Option<Subvariant>)>,
    max_errors_per_sec: u32,
}

impl Config {
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn session_ttl(&self) -> u64 {
        self.session_ttl
    }

    pub fn move_list_ttl(&self) -> u64 {
        self.move_list_ttl
    }

    pub fn cooldown(&self) -> u64 {
        self.cooldown
    }

    pub fn rank_range(&self) -> f64 {
        self.rank_range
    }

    pub fn crowded_rank_range(&self) -> f64 {
        self.crowded_rank_range
    }

    pub fn crowded_queue_len(&self) -> usize {
        self.crowded_queue_len
    }

    pub fn long_wait(&self) -> u64 {
        self.long_wait
    }

    pub fn fallback_delay(&self) -> u64 {
        self.fallback_delay
    }

    pub fn idle_timeout(&self) -> u64 {
        self.idle_timeout
    }

    pub fn cleanup_interval(&self) -> u64 {
        self.cleanup_interval
    }

    pub fn gc_interval(&self) -> u64 {
        self.gc_interval
    }

    pub fn timer_interval(&self) -> u64 {
        self.timer_interval
    }

    pub fn tournament_capacity(&self) -> usize {
        self.tournament_capacity
    }

    pub fn tournament_variants(&self) -> &[(Variant, Option<Subvariant>)] {
        &self.tournament_variants
    }

    pub fn max_errors_per_sec(&self) -> u32 {
        self.max_errors_per_sec
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_ttl: 3_600_000,
            move_list_ttl: 3_600_000,
            cooldown: 10_000,
            rank_range: 100.0,
            crowded_rank_range: 50.0,
            crowded_queue_len: 1000,
            long_wait: 5_000,
            fallback_delay: 10_000,
            idle_timeout: 300_000,
            cleanup_interval: 60_000,
            gc_interval: 900_000,
            timer_interval: 1_000,
            tournament_capacity: 32,
            tournament_variants: vec![
                (Variant::Classic, Some(Subvariant::Standard)),
                (Variant::Classic, Some(Subvariant::Blitz)),
                (Variant::Classic, Some(Subvariant::Bullet)),
                (Variant::Crazyhouse, None),
                (Variant::Decay, None),
                (Variant::SixPointer, None),
            ],
            max_errors_per_sec: 5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn build(self) -> Config {
        self.config
    }

    pub fn session_ttl(self, value: u64) -> Self {
        Self {
            config: Config {
                session_ttl: value,
                ..self.config
            },
        }
    }

    pub fn move_list_ttl(self, value: u64) -> Self {
        Self {
            config: Config {
                move_list_ttl: value,
                ..self.config
            },
        }
    }

    pub fn cooldown(self, value: u64) -> Self {
        Self {
            config: Config {
                cooldown: value,
                ..self.config
            },
        }
    }

    pub fn rank_range(self, value: f64) -> Self {
        Self {
            config: Config {
                rank_range: value,
                ..self.config
            },
        }
    }

    pub fn long_wait(self, value: u64) -> Self {
        Self {
            config: Config {
                long_wait: value,
                ..self.config
            },
        }
    }

    pub fn fallback_delay(self, value: u64) -> Self {
        Self {
            config: Config {
                fallback_delay: value,
                ..self.config
            },
        }
    }

    pub fn idle_timeout(self, value: u64) -> Self {
        Self {
            config: Config {
                idle_timeout: value,
                ..self.config
            },
        }
    }

    pub fn cleanup_interval(self, value: u64) -> Self {
        Self {
            config: Config {
                cleanup_interval: value,
                ..self.config
            },
        }
    }

    pub fn gc_interval(self, value: u64) -> Self {
        Self {
            config: Config {
                gc_interval: value,
                ..self.config
            },
        }
    }

    pub fn timer_interval(self, value: u64) -> Self {
        Self {
            config: Config {
                timer_interval: value,
                ..self.config
            },
        }
    }

    pub fn tournament_capacity(self, value: usize) -> Self {
        Self {
            config: Config {
                tournament_capacity: value,
                ..self.config
            },
        }
    }

    pub fn tournament_variants(self, value: Vec<(Variant, Option<Subvariant>)>) -> Self {
        Self {
            config: Config {
                tournament_variants: value,
                ..self.config
            },
        }
    }

    pub fn max_errors_per_sec(self, value: u32) -> Self {
        Self {
            config: Config {
                max_errors_per_sec: value,
                ..self.config
            },
        }
    }
}
