use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store_url: String,
    pub questions_path: String,
    pub room_ttl_seconds: u64,
    pub total_questions: usize,
    pub answer_duration_seconds: u64,
    pub answer_grace_seconds: u64,
    pub result_display_seconds: u64,
    pub finish_delay_seconds: u64,
    pub auto_reset_seconds: u64,
    pub chat_max_length: usize,
    pub chat_min_interval_ms: u64,
    pub connection_timeout_seconds: u64,
}

fn env_or<T: FromStr>(name: &str, default: &str) -> T {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("Invalid {}", name))
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_or("PORT", "8080"),
            store_url: env::var("STORE_URL").unwrap_or_else(|_| "memory://".to_string()),
            questions_path: env::var("QUESTIONS_PATH")
                .unwrap_or_else(|_| "./questions".to_string()),
            room_ttl_seconds: env_or("ROOM_TTL_SECONDS", "3600"),
            total_questions: env_or("TOTAL_QUESTIONS", "10"),
            answer_duration_seconds: env_or("ANSWER_DURATION_SECONDS", "30"),
            answer_grace_seconds: env_or("ANSWER_GRACE_SECONDS", "2"),
            result_display_seconds: env_or("RESULT_DISPLAY_SECONDS", "3"),
            finish_delay_seconds: env_or("FINISH_DELAY_SECONDS", "2"),
            auto_reset_seconds: env_or("AUTO_RESET_SECONDS", "10"),
            chat_max_length: env_or("CHAT_MAX_LENGTH", "200"),
            chat_min_interval_ms: env_or("CHAT_MIN_INTERVAL_MS", "1000"),
            connection_timeout_seconds: env_or("CONNECTION_TIMEOUT_SECONDS", "300"),
        }
    }

    pub fn room_ttl(&self) -> Duration {
        Duration::from_secs(self.room_ttl_seconds)
    }

    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            answer_duration: Duration::from_secs(self.answer_duration_seconds),
            answer_grace: Duration::from_secs(self.answer_grace_seconds),
            result_display: Duration::from_secs(self.result_display_seconds),
            finish_delay: Duration::from_secs(self.finish_delay_seconds),
            auto_reset: Duration::from_secs(self.auto_reset_seconds),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timings: self.timings(),
            total_questions: self.total_questions,
            chat_max_length: self.chat_max_length,
            chat_min_interval: Duration::from_millis(self.chat_min_interval_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Delays between game phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Answer window advertised to clients
    pub answer_duration: Duration,
    /// Extra time before a question times out, covering client latency
    pub answer_grace: Duration,
    pub result_display: Duration,
    pub finish_delay: Duration,
    pub auto_reset: Duration,
}

impl SessionTimings {
    pub fn question_timeout(&self) -> Duration {
        self.answer_duration + self.answer_grace
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            answer_duration: Duration::from_secs(30),
            answer_grace: Duration::from_secs(2),
            result_display: Duration::from_secs(3),
            finish_delay: Duration::from_secs(2),
            auto_reset: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub timings: SessionTimings,
    pub total_questions: usize,
    pub chat_max_length: usize,
    pub chat_min_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timings: SessionTimings::default(),
            total_questions: 10,
            chat_max_length: duet_core::DEFAULT_CHAT_MAX_LENGTH,
            chat_min_interval: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_timeout_includes_grace() {
        let timings = SessionTimings::default();
        assert_eq!(timings.question_timeout(), Duration::from_secs(32));
    }

    #[test]
    fn test_session_config_from_config() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            store_url: "memory://".to_string(),
            questions_path: "./questions".to_string(),
            room_ttl_seconds: 60,
            total_questions: 4,
            answer_duration_seconds: 20,
            answer_grace_seconds: 1,
            result_display_seconds: 5,
            finish_delay_seconds: 1,
            auto_reset_seconds: 8,
            chat_max_length: 120,
            chat_min_interval_ms: 500,
            connection_timeout_seconds: 300,
        };

        let session = config.session_config();
        assert_eq!(session.total_questions, 4);
        assert_eq!(session.chat_max_length, 120);
        assert_eq!(session.chat_min_interval, Duration::from_millis(500));
        assert_eq!(session.timings.result_display, Duration::from_secs(5));
        assert_eq!(config.room_ttl(), Duration::from_secs(60));
    }
}
