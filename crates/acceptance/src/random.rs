//! Random suffixes for acceptance resource names

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use rand::Rng;

/// Time-based random integer: `yyMMddHHmmss`, hundredths of a second and
/// three random digits.
///
/// Successive runs sort by creation time, which makes leaked test resources
/// easy to date.
pub fn acc_rand_time_int() -> i64 {
    let suffix = rand::thread_rng().gen_range(0..1000);
    rand_time_int_at(Local::now().naive_local(), suffix)
}

fn rand_time_int_at(now: NaiveDateTime, suffix: u16) -> i64 {
    let fields = [
        i64::from(now.year() % 100),
        i64::from(now.month()),
        i64::from(now.day()),
        i64::from(now.hour()),
        i64::from(now.minute()),
        i64::from(now.second()),
        i64::from(now.nanosecond() % 1_000_000_000 / 10_000_000),
    ];

    let stamp = fields.iter().fold(0, |acc, field| acc * 100 + field);
    stamp * 1000 + i64::from(suffix % 1000)
}
