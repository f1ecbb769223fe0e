mod time_utils;

pub use time_utils::{
    TimeUtils, day_bounds_ms, epoch_ms_to_record_time, parse_day, today_utc,
};
