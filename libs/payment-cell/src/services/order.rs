use chrono::{DateTime, Utc};
use rand::Rng;

/// `ORD-{unix millis}-{0..=999}`. A fresh number for every attempt.
pub fn generate_order_no() -> String {
    order_no_at(Utc::now(), rand::thread_rng().gen_range(0..=999))
}

pub fn order_no_at(now: DateTime<Utc>, suffix: u16) -> String {
    format!("ORD-{}-{}", now.timestamp_millis(), suffix)
}

/// Unix seconds as sent in `TIMESTAMP`.
pub fn payment_timestamp(now: DateTime<Utc>) -> String {
    now.timestamp().to_string()
}
