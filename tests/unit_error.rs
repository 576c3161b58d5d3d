use sheetsync::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_by_category() {
    assert_eq!(
        Error::SheetNotFound("/x.csv".to_string()).exit_code(),
        exit_codes::USER_ERROR
    );
    assert_eq!(Error::RowNotFound(7).exit_code(), exit_codes::USER_ERROR);
    assert_eq!(
        Error::InvalidArgument("bad".to_string()).exit_code(),
        exit_codes::USER_ERROR
    );

    assert_eq!(
        Error::LockConflict {
            owner: "bob".to_string()
        }
        .exit_code(),
        exit_codes::CONFLICT
    );
    assert_eq!(
        Error::RowLocked {
            column: 3,
            owner: "bob".to_string()
        }
        .exit_code(),
        exit_codes::CONFLICT
    );

    assert_eq!(
        Error::OperationFailed("x".to_string()).exit_code(),
        exit_codes::OPERATION_FAILED
    );
    assert_eq!(
        Error::Io(std::io::Error::other("disk")).exit_code(),
        exit_codes::OPERATION_FAILED
    );
}

#[test]
fn conflicts_are_distinguishable_from_hard_errors() {
    assert!(Error::LockConflict {
        owner: "bob".to_string()
    }
    .is_conflict());
    assert!(Error::SheetLocked {
        path: "/x.csv".to_string(),
        owner: "bob".to_string()
    }
    .is_conflict());

    assert!(!Error::SheetNotFound("/x.csv".to_string()).is_conflict());
    assert!(!Error::OperationFailed("x".to_string()).is_conflict());
}

#[test]
fn row_locked_message_names_column_and_owner() {
    let err = Error::RowLocked {
        column: 4,
        owner: "carol".to_string(),
    };
    let message = err.to_string();
    assert!(message.contains('4'));
    assert!(message.contains("carol"));
}

#[test]
fn json_error_carries_structured_details() {
    let err = Error::RowLocked {
        column: 2,
        owner: "bob".to_string(),
    };
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::CONFLICT);

    let details = json.details.expect("conflict details");
    assert_eq!(details["column"], 2);
    assert_eq!(details["owner"], "bob");

    // Hard errors have no structured details.
    let io = Error::OperationFailed("x".to_string());
    assert!(JsonError::from(&io).details.is_none());
}
