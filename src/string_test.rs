use crate::string::{parse_number_string, right_pad};

#[test]
fn test_parse_number_string() {
    assert_eq!(1234, parse_number_string("1234").unwrap());
    assert_eq!(0xFFFF, parse_number_string("0xFFFF").unwrap());
    assert_eq!(0x0B80, parse_number_string("0B80h").unwrap());
    assert_eq!(-2, parse_number_string("-2").unwrap());
    assert_eq!(-0x10, parse_number_string("-0x10").unwrap());
    assert_eq!(1_000, parse_number_string("1_000").unwrap());
    assert!(parse_number_string("bx").is_err());
    assert!(parse_number_string("ah").is_err());
}

#[test]
fn can_right_pad() {
    assert_eq!("Mov8     ", right_pad("Mov8", 9));
    assert_eq!("CallNear", right_pad("CallNear", 4));
}

#[test]
fn rejects_non_ascii_numbers() {
    assert!(parse_number_string("aé").is_err());
    assert!(parse_number_string("0é").is_err());
    assert!(parse_number_string("é0x").is_err());
    assert!(parse_number_string("0xé").is_err());
    assert!(parse_number_string("1éh").is_err());
}
