use std::num::ParseIntError;

/// Parses a snowflake stored as text.
pub fn id_from_string<T>(value: &str) -> Result<T, ParseIntError>
where
    T: From<u64>,
{
    value.parse::<u64>().map(|int| T::from(int))
}

#[cfg(test)]
mod tests {
    use poise::serenity_prelude::UserId;

    use super::*;

    #[test]
    fn parses_stored_snowflakes() {
        let id = UserId::new(193136312759353344);
        assert_eq!(id_from_string::<UserId>("193136312759353344").unwrap(), id);
        assert!(id_from_string::<UserId>("not-a-snowflake").is_err());
    }
}
