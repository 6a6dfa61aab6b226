use domain::{Status, connector_status, gateway_status};

#[test]
fn connector_active_when_any_device_active() {
    let devices = [Status::Active, Status::Inactive, Status::Inactive];
    assert_eq!(connector_status(&devices), Status::Active);
}

#[test]
fn connector_inactive_when_all_devices_inactive() {
    let devices = [Status::Inactive, Status::Inactive];
    assert_eq!(connector_status(&devices), Status::Inactive);
    assert_eq!(connector_status(&[]), Status::Inactive);
}

#[test]
fn gateway_active_with_single_inbound() {
    assert_eq!(gateway_status(&[Status::Active], &[]), Status::Active);
    assert_eq!(
        gateway_status(&[Status::Inactive], &[Status::Active]),
        Status::Active
    );
    assert_eq!(
        gateway_status(&[Status::Inactive], &[Status::Inactive]),
        Status::Inactive
    );
}

#[test]
fn status_parse_is_lenient() {
    assert_eq!(Status::parse("ACTIVE"), Status::Active);
    assert_eq!(Status::parse("offline"), Status::Inactive);
    assert_eq!(Status::Active.as_str(), "active");
}
