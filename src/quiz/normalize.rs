use crate::error::FormatReason;

/// Longest accepted answer, not counting one leading minus sign.
pub const MAX_ANSWER_LEN: usize = 5;

/// Canonicalize one answer token. Simple fractions are converted to decimals
/// so `2/3` and `0.667` compare equal later; everything else is kept verbatim.
/// The rendered fraction never grows past the same width budget a plain token
/// gets: sign + digits + decimal point fit in 5 characters (6 with the sign).
pub fn normalize_token(token: &str) -> Result<String, FormatReason> {
    let token = token.trim();
    let (sign, body) = match token.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", token),
    };

    if body.chars().count() > MAX_ANSWER_LEN {
        return Err(FormatReason::AnswerTooLong);
    }

    if body.matches('/').count() == 1 {
        return normalize_fraction(sign, body);
    }

    Ok(token.to_owned())
}

fn normalize_fraction(sign: &str, body: &str) -> Result<String, FormatReason> {
    let (numerator, denominator) = body.split_once('/').ok_or(FormatReason::BadFraction)?;
    let numerator: u32 = numerator.parse().map_err(|_| FormatReason::BadFraction)?;
    let denominator: u32 = denominator.parse().map_err(|_| FormatReason::BadFraction)?;
    if denominator == 0 {
        return Err(FormatReason::BadFraction);
    }

    let quotient = f64::from(numerator) / f64::from(denominator);

    // The integer part plus the decimal point eat into the budget; whatever
    // is left goes to fractional digits. The length rule above caps the
    // numerator at 3 digits, so at least one fractional digit always remains.
    let integer_digits = (quotient.trunc() as u64).to_string().len();
    let decimals = MAX_ANSWER_LEN.saturating_sub(integer_digits + 1);
    let rendered = format!("{quotient:.decimals$}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');

    Ok(format!("{sign}{rendered}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_tokens_pass_through_verbatim() {
        assert_eq!(normalize_token("A").unwrap(), "A");
        assert_eq!(normalize_token("12345").unwrap(), "12345");
        assert_eq!(normalize_token("-12.3").unwrap(), "-12.3");
        assert_eq!(normalize_token("  B  ").unwrap(), "B");
    }

    #[test]
    fn length_is_counted_without_the_leading_minus() {
        assert_eq!(normalize_token("-12345").unwrap(), "-12345");
        assert_eq!(normalize_token("123456"), Err(FormatReason::AnswerTooLong));
        assert_eq!(normalize_token("-123456"), Err(FormatReason::AnswerTooLong));
    }

    #[test]
    fn fractions_become_decimals() {
        assert_eq!(normalize_token("2/3").unwrap(), "0.667");
        assert_eq!(normalize_token("-2/3").unwrap(), "-0.667");
        assert_eq!(normalize_token("3/4").unwrap(), "0.75");
        assert_eq!(normalize_token("1/3").unwrap(), "0.333");
        assert_eq!(normalize_token("10/4").unwrap(), "2.5");
    }

    #[test]
    fn whole_quotients_drop_the_decimal_point() {
        assert_eq!(normalize_token("999/1").unwrap(), "999");
        assert_eq!(normalize_token("10/5").unwrap(), "2");
        assert_eq!(normalize_token("0/5").unwrap(), "0");
    }

    #[test]
    fn malformed_fractions_are_rejected() {
        assert_eq!(normalize_token("1/0"), Err(FormatReason::BadFraction));
        assert_eq!(normalize_token("a/b"), Err(FormatReason::BadFraction));
        assert_eq!(normalize_token("1.5/2"), Err(FormatReason::BadFraction));
        assert_eq!(normalize_token("2/-3"), Err(FormatReason::BadFraction));
    }

    #[test]
    fn two_slashes_are_not_a_fraction() {
        // matches the plain-token rule: only exactly one slash converts
        assert_eq!(normalize_token("1/2/3").unwrap(), "1/2/3");
    }

    #[test]
    fn rendered_fractions_respect_the_width_budget() {
        for numerator in 1..=999u32 {
            for denominator in [1u32, 3, 7, 9, 13] {
                let token = format!("{numerator}/{denominator}");
                if token.chars().count() > MAX_ANSWER_LEN {
                    continue;
                }
                let rendered = normalize_token(&token).unwrap();
                assert!(
                    rendered.chars().count() <= MAX_ANSWER_LEN,
                    "{token} rendered as {rendered}"
                );
                let truth = f64::from(numerator) / f64::from(denominator);
                let integer_digits = (truth.trunc() as u64).to_string().len();
                let decimals = MAX_ANSWER_LEN - integer_digits - 1;
                let reparsed: f64 = rendered.parse().unwrap();
                assert!(
                    (reparsed - truth).abs() <= 0.500001 * 10f64.powi(-(decimals as i32)),
                    "{token} rendered as {rendered}"
                );
            }
        }
    }
}
