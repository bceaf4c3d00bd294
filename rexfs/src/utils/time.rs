// SPDX-License-Identifier: MIT

//! exFAT timestamp encoding.
//!
//! A timestamp is a packed `u32` (FAT date and time, 2-second resolution),
//! a 10 ms increment (0-199) and a UTC offset byte: bit 7 marks the offset
//! as valid, bits 0-6 hold a signed count of 15-minute steps.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExFatTimestamp {
    pub raw: u32,
    pub increment_10ms: u8,
    pub utc_offset: u8,
}

impl ExFatTimestamp {
    pub const fn new(raw: u32, increment_10ms: u8, utc_offset: u8) -> Self {
        Self {
            raw,
            increment_10ms,
            utc_offset,
        }
    }

    pub fn from_datetime(ts: OffsetDateTime) -> Self {
        let year = ts.year().clamp(1980, 2107) as u32;
        let month = ts.month() as u32;
        let day = ts.day() as u32;
        let hour = ts.hour() as u32;
        let minute = ts.minute() as u32;
        let second = ts.second() as u32;

        let date = ((year - 1980) << 25) | (month << 21) | (day << 16);
        let time = (hour << 11) | (minute << 5) | (second / 2);

        let increment_10ms = ((second % 2) * 100 + ts.millisecond() as u32 / 10) as u8;

        let steps = (ts.offset().whole_minutes() / 15).clamp(-64, 63) as i8;
        let utc_offset = (steps as u8 & 0x7F) | 0x80;

        Self {
            raw: date | time,
            increment_10ms,
            utc_offset,
        }
    }

    /// Offset from UTC, or `None` when the entry does not record one.
    pub fn offset(&self) -> Option<UtcOffset> {
        if self.utc_offset & 0x80 == 0 {
            return None;
        }
        // sign-extend the 7-bit field
        let steps = ((self.utc_offset << 1) as i8) >> 1;
        UtcOffset::from_whole_seconds(steps as i32 * 15 * 60).ok()
    }

    /// Decodes the timestamp, treating a missing offset as UTC.
    ///
    /// Returns `None` for an all-zero or out-of-range encoding.
    pub fn to_datetime(&self) -> Option<OffsetDateTime> {
        if self.raw == 0 {
            return None;
        }
        let year = 1980 + (self.raw >> 25) as i32;
        let month = Month::try_from(((self.raw >> 21) & 0x0F) as u8).ok()?;
        let day = ((self.raw >> 16) & 0x1F) as u8;
        let hour = ((self.raw >> 11) & 0x1F) as u8;
        let minute = ((self.raw >> 5) & 0x3F) as u8;
        let second = (self.raw & 0x1F) as u8 * 2 + self.increment_10ms / 100;
        let milli = (self.increment_10ms % 100) as u16 * 10;

        let date = Date::from_calendar_date(year, month, day).ok()?;
        let time = Time::from_hms_milli(hour, minute, second, milli).ok()?;
        let offset = self.offset().unwrap_or(UtcOffset::UTC);
        Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OffsetDateTime {
        let date = Date::from_calendar_date(2019, Month::March, 14).unwrap();
        let time = Time::from_hms_milli(15, 9, 27, 530).unwrap();
        PrimitiveDateTime::new(date, time).assume_offset(UtcOffset::from_hms(2, 0, 0).unwrap())
    }

    #[test]
    fn test_encode_layout() {
        let ts = ExFatTimestamp::from_datetime(sample());
        assert_eq!(ts.raw >> 25, 39);
        assert_eq!((ts.raw >> 21) & 0x0F, 3);
        assert_eq!((ts.raw >> 16) & 0x1F, 14);
        assert_eq!(ts.raw & 0x1F, 13);
        assert_eq!(ts.increment_10ms, 153);
        assert_eq!(ts.utc_offset, 0x80 | 8);
    }

    #[test]
    fn test_decode_restores_odd_seconds_and_offset() {
        let decoded = ExFatTimestamp::from_datetime(sample()).to_datetime().unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(decoded.second(), 27);
        assert_eq!(decoded.offset().whole_hours(), 2);
    }

    #[test]
    fn test_negative_offset() {
        let ts = ExFatTimestamp::new(0, 0, 0x80 | 0x7C); // -4 steps
        assert_eq!(ts.offset().unwrap().whole_minutes(), -60);
    }

    #[test]
    fn test_missing_offset_and_zero() {
        assert_eq!(ExFatTimestamp::new(0x4E6E_7800, 0, 0).offset(), None);
        assert_eq!(ExFatTimestamp::default().to_datetime(), None);
        // month 0 is invalid
        assert_eq!(ExFatTimestamp::new(0x4E0E_0000, 0, 0).to_datetime(), None);
    }
}
