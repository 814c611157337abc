//! Wall clock and run-time statistics.
//!
//! ```text
//!   WRITE CLOCK ──▶ Clock ──(+1 s per tick)──▶ day rollover?
//!                                                  │
//!   effective speed ──▶ StatsBook.current ◀────────┘ push into history
//!                        totals (lifetime)          (last 7 days)
//! ```
//!
//! STATS index 0 is the day in progress, index `n` is the day `n` days ago.

use heapless::Deque;

use crate::model::Speed;

/// Days kept in the history ring.
pub const STATS_HISTORY_DAYS: usize = 7;

// ───────────────────────────────────────────────────────────────
// Calendar
// ───────────────────────────────────────────────────────────────

/// Years are stored as an offset from 2000.
pub fn is_leap_year(year: u8) -> bool {
    let y = 2000 + u32::from(year);
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

/// Days in `month` (1..=12) of `year`; 0 for an invalid month.
pub fn days_in_month(year: u8, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    /// Years since 2000.
    pub year: u8,
    pub month: u8,
    pub day: u8,
    /// Day of week, 0 = Monday.
    pub dow: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.dow <= 6
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
    }
}

impl Default for DateTime {
    /// 2000-01-01 00:00:00, a Saturday.
    fn default() -> Self {
        Self {
            year: 0,
            month: 1,
            day: 1,
            dow: 5,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

/// Software wall clock advanced by the control tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    now: DateTime,
    dst: bool,
}

impl Clock {
    pub fn set(&mut self, now: DateTime, dst: bool) {
        self.now = now;
        self.dst = dst;
    }

    pub fn now(&self) -> DateTime {
        self.now
    }

    pub fn dst(&self) -> bool {
        self.dst
    }

    /// Advance one second.  Returns `true` when a new day starts.
    pub fn tick(&mut self) -> bool {
        let t = &mut self.now;
        t.second += 1;
        if t.second < 60 {
            return false;
        }
        t.second = 0;
        t.minute += 1;
        if t.minute < 60 {
            return false;
        }
        t.minute = 0;
        t.hour += 1;
        if t.hour < 24 {
            return false;
        }
        t.hour = 0;
        t.dow = (t.dow + 1) % 7;
        t.day += 1;
        if t.day > days_in_month(t.year, t.month) {
            t.day = 1;
            t.month += 1;
            if t.month > 12 {
                t.month = 1;
                t.year = t.year.wrapping_add(1);
            }
        }
        true
    }
}

// ───────────────────────────────────────────────────────────────
// Statistics
// ───────────────────────────────────────────────────────────────

/// Seconds spent at each speed level, indexed by `Speed as usize`.
pub type SpeedCounters = [u32; Speed::COUNT];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStats {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub secs: SpeedCounters,
}

impl DayStats {
    fn starting(at: DateTime) -> Self {
        Self {
            year: at.year,
            month: at.month,
            day: at.day,
            secs: [0; Speed::COUNT],
        }
    }
}

/// One STATS answer: a day plus the lifetime totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRecord {
    pub day: DayStats,
    pub totals: SpeedCounters,
}

pub struct StatsBook {
    current: DayStats,
    totals: SpeedCounters,
    /// Most recent first.
    history: Deque<DayStats, STATS_HISTORY_DAYS>,
}

impl StatsBook {
    pub fn new(today: DateTime) -> Self {
        Self {
            current: DayStats::starting(today),
            totals: [0; Speed::COUNT],
            history: Deque::new(),
        }
    }

    /// Account one second at `speed`.
    pub fn record(&mut self, speed: Speed) {
        let i = speed as usize;
        self.current.secs[i] = self.current.secs[i].saturating_add(1);
        self.totals[i] = self.totals[i].saturating_add(1);
    }

    /// Close the current day and open one for `today`.
    pub fn roll_day(&mut self, today: DateTime) {
        if self.history.is_full() {
            self.history.pop_back();
        }
        // cannot fail: a slot was freed above
        let _ = self.history.push_front(self.current);
        self.current = DayStats::starting(today);
    }

    /// The clock was set by a peer: re-date the day in progress.
    pub fn redate(&mut self, today: DateTime) {
        self.current.year = today.year;
        self.current.month = today.month;
        self.current.day = today.day;
    }

    /// Highest index a STATS query may ask for.
    pub fn last_index(&self) -> u16 {
        self.history.len() as u16
    }

    pub fn get(&self, index: u16) -> Option<StatsRecord> {
        let day = if index == 0 {
            self.current
        } else {
            *self.history.iter().nth(usize::from(index) - 1)?
        };
        Some(StatsRecord {
            day,
            totals: self.totals,
        })
    }
}

/// Whole hours in a seconds counter, saturated to the wire width.
pub fn hours(secs: u32) -> u16 {
    (secs / 3600).min(u32::from(u16::MAX)) as u16
}
