/*
 * date.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, a socket-level HTTP(S) client engine.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Cookie Expires parsing per the RFC 6265 date algorithm: tokenize on
//! delimiter classes, then fish the day, month, year and time out of the
//! tokens in any order.

use chrono::{DateTime, NaiveDate, Utc};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn is_delimiter(b: u8) -> bool {
    b == 0x09
        || (0x20..=0x2f).contains(&b)
        || (0x3b..=0x40).contains(&b)
        || (0x5b..=0x60).contains(&b)
        || (0x7b..=0x7e).contains(&b)
}

fn leading_digits(token: &str) -> (&str, &str) {
    let end = token
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(token.len());
    token.split_at(end)
}

// A date token may carry trailing octets below 0x30 (never seen in
// practice, but the algorithm allows them).
fn junk_tail(rest: &str) -> bool {
    match rest.bytes().next() {
        None => true,
        Some(b) => b <= 0x2f,
    }
}

fn month_number(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    let prefix = token[..3].to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|i| i as u32 + 1)
}

fn time_fields(token: &str) -> Option<(u32, u32, u32)> {
    let mut parts = token.splitn(3, ':');
    let mut next = || -> Option<(u32, &str)> {
        let part = parts.next()?;
        let (digits, rest) = leading_digits(part);
        if digits.is_empty() || digits.len() > 2 {
            return None;
        }
        Some((digits.parse().ok()?, rest))
    };
    let (h, r) = next()?;
    if !r.is_empty() {
        return None;
    }
    let (m, r) = next()?;
    if !r.is_empty() {
        return None;
    }
    let (s, r) = next()?;
    if !junk_tail(r) {
        return None;
    }
    Some((h, m, s))
}

/// Parses a cookie date. Returns None for unparseable or pre-1601 dates;
/// 1601-1969 dates clamp to the epoch.
pub fn parse_cookie_date(s: &str) -> Option<DateTime<Utc>> {
    let mut day: Option<u32> = None;
    let mut month: Option<u32> = None;
    let mut year: Option<i32> = None;
    let mut time: Option<(u32, u32, u32)> = None;

    let bytes = s.as_bytes();
    let mut start = 0;
    let mut tokens = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        if is_delimiter(b) {
            if i > start {
                tokens.push(&s[start..i]);
            }
            start = i + 1;
        }
    }
    if bytes.len() > start {
        tokens.push(&s[start..]);
    }

    for token in tokens {
        if time.is_none() {
            if let Some(t) = time_fields(token) {
                time = Some(t);
                continue;
            }
        }
        let (digits, rest) = leading_digits(token);
        if !digits.is_empty() && junk_tail(rest) {
            match digits.len() {
                1 => {
                    day = Some(digits.parse().ok()?);
                    continue;
                }
                2 => {
                    // a second two-digit number is the abbreviated year
                    if day.is_some() {
                        if year.is_some() {
                            return None;
                        }
                        let y: i32 = digits.parse().ok()?;
                        year = Some(if y < 70 { y + 2000 } else { y + 1900 });
                    } else {
                        day = Some(digits.parse().ok()?);
                    }
                    continue;
                }
                4 => {
                    if year.is_some() {
                        return None;
                    }
                    year = Some(digits.parse().ok()?);
                    continue;
                }
                _ => {}
            }
        }
        if let Some(m) = month_number(token) {
            if month.is_some() {
                return None;
            }
            month = Some(m);
        }
    }

    let (day, month, year) = (day?, month?, year?);
    let (hour, minute, second) = time.unwrap_or((0, 0, 0));
    if hour > 23 || minute > 59 || second > 59 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    if year < 1601 {
        return None;
    }
    if year < 1970 {
        return Some(DateTime::<Utc>::UNIX_EPOCH);
    }
    Some(date.and_hms_opt(hour, minute, second)?.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn rfc1123_format() {
        let d = parse_cookie_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (1994, 11, 6));
        assert_eq!((d.hour(), d.minute(), d.second()), (8, 49, 37));
    }

    #[test]
    fn rfc850_two_digit_year() {
        let d = parse_cookie_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
        assert_eq!(d.year(), 1994);
        let d = parse_cookie_date("Sat, 06-Nov-04 08:49:37 GMT").unwrap();
        assert_eq!(d.year(), 2004);
    }

    #[test]
    fn asctime_format() {
        let d = parse_cookie_date("Sun Nov  6 08:49:37 1994").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (1994, 11, 6));
    }

    #[test]
    fn missing_time_defaults_to_midnight() {
        let d = parse_cookie_date("06 Nov 1994").unwrap();
        assert_eq!((d.hour(), d.minute(), d.second()), (0, 0, 0));
    }

    #[test]
    fn rejects_incomplete_or_invalid_dates() {
        assert!(parse_cookie_date("Nov 1994").is_none());
        assert!(parse_cookie_date("31 Feb 2020 00:00:00").is_none());
        assert!(parse_cookie_date("06 Nov 1994 25:00:00").is_none());
        assert!(parse_cookie_date("garbage").is_none());
    }

    #[test]
    fn rejects_duplicate_fields() {
        assert!(parse_cookie_date("06 Nov Dec 1994 08:49:37").is_none());
        assert!(parse_cookie_date("06 Nov 1994 1995 08:49:37").is_none());
    }

    #[test]
    fn ancient_years() {
        assert!(parse_cookie_date("06 Nov 1500 00:00:00").is_none());
        let d = parse_cookie_date("06 Nov 1960 00:00:00").unwrap();
        assert_eq!(d, DateTime::<Utc>::UNIX_EPOCH);
    }
}
