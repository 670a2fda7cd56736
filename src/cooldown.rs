use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

pub const REFRESH_COMMAND: &str = "refreshmods";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cooldown {
    Ready,
    UserBlocked { remaining_secs: u64 },
    RefreshBlocked { remaining_secs: u64 },
}

pub struct CooldownGate {
    user_interval: Duration,
    refresh_interval: Duration,
    users: HashMap<String, Instant>,
    refresh_stamp: Option<Instant>,
}

impl CooldownGate {
    pub fn new(user_interval: Duration, refresh_interval: Duration) -> Self {
        Self {
            user_interval,
            refresh_interval,
            users: HashMap::new(),
            refresh_stamp: None,
        }
    }

    pub fn check(&mut self, user: &str, command: &str) -> Cooldown {
        self.check_at(Instant::now(), user, command)
    }

    fn check_at(&mut self, now: Instant, user: &str, command: &str) -> Cooldown {
        if let Some(last) = self.users.get(user) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.user_interval {
                return Cooldown::UserBlocked {
                    remaining_secs: remaining_secs(self.user_interval, elapsed),
                };
            }
        }

        if command == REFRESH_COMMAND {
            if let Some(last) = self.refresh_stamp {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.refresh_interval {
                    return Cooldown::RefreshBlocked {
                        remaining_secs: remaining_secs(self.refresh_interval, elapsed),
                    };
                }
            }
        }

        self.users.insert(user.to_string(), now);
        if command == REFRESH_COMMAND {
            self.refresh_stamp = Some(now);
        }
        Cooldown::Ready
    }
}

fn remaining_secs(interval: Duration, elapsed: Duration) -> u64 {
    (interval - elapsed).as_secs().max(1)
}
