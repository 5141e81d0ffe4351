pub const PIN_LENGTH: usize = 4;

pub const INVALID_PIN: &str = "PIN must be blank, or consist of 4 digits.";
pub const EMPTY_RFID_UID: &str = "The RFID UID must not be empty.";

/// A PIN is either blank or exactly four ASCII digits. Other Unicode digits
/// are rejected; whether keypads can ever send them is an open product-owner
/// question.
pub fn is_valid_pin(pin: &str) -> bool {
    pin.is_empty() || (pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()))
}

/// Every rule a new keypair breaks, in a fixed order. Empty when the pair is acceptable.
pub fn new_keypair_errors(pin: &str, rfid_uid: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if !is_valid_pin(pin) {
        errors.push(INVALID_PIN);
    }
    if rfid_uid.is_empty() {
        errors.push(EMPTY_RFID_UID);
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_rule() {
        assert!(is_valid_pin(""));
        assert!(is_valid_pin("1234"));
        assert!(is_valid_pin("0000"));
        assert!(!is_valid_pin("12a4"));
        assert!(!is_valid_pin("123"));
        assert!(!is_valid_pin("12345"));
        assert!(!is_valid_pin(" 123"));
    }

    #[test]
    fn test_non_ascii_digits_rejected() {
        // Keypads only send ASCII digits; revisit if the product owner says otherwise
        assert!(!is_valid_pin("١٢٣٤"));
    }

    #[test]
    fn test_both_errors_reported() {
        let errors = new_keypair_errors("12", "");
        assert_eq!(errors, vec![INVALID_PIN, EMPTY_RFID_UID]);
    }

    #[test]
    fn test_valid_pair_has_no_errors() {
        assert!(new_keypair_errors("", "04A1B2C3").is_empty());
        assert!(new_keypair_errors("4321", "04A1B2C3").is_empty());
    }
}
