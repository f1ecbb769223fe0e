/// One bounded request range inside a day, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl FetchWindow {
    /// Window starting at `start_ms`, `span_ms` wide, clipped to `day_end_ms`.
    pub fn clipped(start_ms: i64, span_ms: i64, day_end_ms: i64) -> Self {
        FetchWindow {
            start_ms,
            end_ms: (start_ms + span_ms).min(day_end_ms),
        }
    }

    /// The following window, or None once the cursor reaches the end of the day.
    pub fn advance(&self, span_ms: i64, day_end_ms: i64) -> Option<Self> {
        let next_start = self.start_ms + span_ms;
        (next_start < day_end_ms).then(|| Self::clipped(next_start, span_ms, day_end_ms))
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start_ms, self.end_ms)
    }
}
