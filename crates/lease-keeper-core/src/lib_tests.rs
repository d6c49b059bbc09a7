//! Tests for the lease-keeper-core library module.

use super::*;

#[test]
fn test_tenant_id_validation() {
    assert!(TenantId::new("acme").is_ok());
    assert!(TenantId::new("team-a_1.prod").is_ok());

    assert!(matches!(
        TenantId::new(""),
        Err(ValidationError::Required { .. })
    ));

    let too_long = "a".repeat(TenantId::MAX_LENGTH + 1);
    assert!(matches!(
        TenantId::new(too_long),
        Err(ValidationError::TooLong { .. })
    ));

    // The separator would make qualified names ambiguous
    assert!(matches!(
        TenantId::new("acme:evil"),
        Err(ValidationError::InvalidCharacters { .. })
    ));
    assert!(matches!(
        TenantId::new("has space"),
        Err(ValidationError::InvalidCharacters { .. })
    ));
}

#[test]
fn test_tenant_id_max_length_accepted() {
    let exact = "t".repeat(TenantId::MAX_LENGTH);
    assert!(TenantId::new(exact).is_ok());
}

#[test]
fn test_queue_name_validation() {
    assert!(QueueName::new("orders").is_ok());
    assert!(QueueName::new("orders:eu/west#1").is_ok());

    assert!(matches!(
        QueueName::new(""),
        Err(ValidationError::Required { .. })
    ));

    let too_long = "q".repeat(QueueName::MAX_LENGTH + 1);
    assert!(matches!(
        QueueName::new(too_long),
        Err(ValidationError::TooLong { .. })
    ));

    assert!(matches!(
        QueueName::new("two words"),
        Err(ValidationError::InvalidCharacters { .. })
    ));
    assert!(matches!(
        QueueName::new("tab\there"),
        Err(ValidationError::InvalidCharacters { .. })
    ));
}

#[test]
fn test_qualified_queue_name_format() {
    let tenant = TenantId::new("acme").unwrap();
    let queue = QueueName::new("orders").unwrap();

    let qualified = QualifiedQueueName::new(&tenant, &queue);

    assert_eq!(qualified.as_str(), "acme:orders");
    assert_eq!(qualified.tenant(), "acme");
    assert_eq!(qualified.queue(), "orders");
    assert_eq!(qualified.to_string(), "acme:orders");
}

#[test]
fn test_qualified_queue_name_keeps_colons_in_queue() {
    let tenant = TenantId::new("acme").unwrap();
    let queue = QueueName::new("a:b").unwrap();

    let qualified = QualifiedQueueName::new(&tenant, &queue);

    assert_eq!(qualified.tenant(), "acme");
    assert_eq!(qualified.queue(), "a:b");
}

#[test]
fn test_same_queue_name_differs_across_tenants() {
    let queue = QueueName::new("jobs").unwrap();
    let a = QualifiedQueueName::new(&TenantId::new("a").unwrap(), &queue);
    let b = QualifiedQueueName::new(&TenantId::new("b").unwrap(), &queue);

    assert_ne!(a, b);
}

#[test]
fn test_message_id_generation() {
    let id1 = MessageId::generate().unwrap();
    let id2 = MessageId::generate().unwrap();

    assert_ne!(id1, id2);
    // 16 bytes of URL-safe base64 without padding
    assert_eq!(id1.as_str().len(), 22);
    assert!(!id1.as_str().contains('='));
    assert!(!id1.as_str().contains('+'));
    assert!(!id1.as_str().contains('/'));
}

#[test]
fn test_message_id_parse() {
    let parsed: MessageId = "abc".parse().unwrap();
    assert_eq!(parsed.as_str(), "abc");

    assert!(matches!(
        "".parse::<MessageId>(),
        Err(ValidationError::Required { .. })
    ));
}

#[test]
fn test_key_id_generation_and_parse() {
    let key_id = KeyId::generate().unwrap();

    // 8 bytes of URL-safe base64 without padding
    assert_eq!(key_id.as_str().len(), 11);

    let parsed: KeyId = key_id.as_str().parse().unwrap();
    assert_eq!(parsed, key_id);

    assert!("".parse::<KeyId>().is_err());
    assert!("a.b".parse::<KeyId>().is_err());
}

#[test]
fn test_timestamp_ordering_and_format() {
    let first = Timestamp::now();
    let second = Timestamp::now();

    assert!(second >= first);
    assert!(first.to_rfc3339().contains('T'));
    assert_eq!(first.to_string(), first.to_rfc3339());
}

#[test]
fn test_broker_error_classification() {
    let timeout = BrokerError::Timeout {
        waited: Duration::from_secs(5),
    };
    assert!(timeout.is_transient());
    assert!(timeout.is_client_error());

    let internal = BrokerError::Internal {
        message: "boom".to_string(),
    };
    assert!(!internal.is_transient());
    assert!(!internal.is_client_error());

    let unauthorized = BrokerError::Unauthorized {
        reason: "invalid API key".to_string(),
    };
    assert!(!unauthorized.is_transient());
    assert!(unauthorized.is_client_error());
}

#[test]
fn test_validation_error_converts_to_broker_error() {
    let error: BrokerError = ValidationError::Required {
        field: "queue".to_string(),
    }
    .into();

    assert!(matches!(error, BrokerError::Validation(_)));
    assert_eq!(
        error.to_string(),
        "Validation error: Field 'queue' is required"
    );
}
