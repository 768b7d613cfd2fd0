// Nom helpers for the small textual formats this crate parses.
use nom::{
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res},
    sequence::separated_pair,
    IResult,
};

/// Parse one or two ASCII digits into a u8.
/// (Complete)
fn two_digit_num(i: &str) -> IResult<&str, u8> {
    map_res(digit1, |d: &str| d.parse::<u8>())(i)
}

/// Parse a full `"HH:MM"` string, consuming all input.
/// (Complete)
pub fn parse_hh_mm(i: &str) -> IResult<&str, (u8, u8)> {
    all_consuming(separated_pair(two_digit_num, char(':'), two_digit_num))(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hh_mm() {
        assert_eq!(parse_hh_mm("23:00").unwrap().1, (23, 0));
        assert_eq!(parse_hh_mm("06:05").unwrap().1, (6, 5));
        assert_eq!(parse_hh_mm("0:0").unwrap().1, (0, 0));
    }

    #[test]
    fn test_parse_hh_mm_rejects_trailing_garbage() {
        assert!(parse_hh_mm("23:00:00").is_err());
        assert!(parse_hh_mm("noon").is_err());
    }
}
