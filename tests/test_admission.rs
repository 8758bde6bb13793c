//! Admission controller capacity behavior

use vigil::infrastructure::admission::AdmissionController;

#[test]
fn fourth_concurrent_admit_is_rejected_with_counts() {
    let controller = AdmissionController::new(3);

    let _one = controller.try_admit().unwrap();
    let _two = controller.try_admit().unwrap();
    let three = controller.try_admit().unwrap();

    let rejected = controller.try_admit().unwrap_err();
    assert_eq!(rejected.running, 3);
    assert_eq!(rejected.max, 3);

    // Any running job releasing makes the next admit succeed.
    drop(three);
    assert!(controller.try_admit().is_ok());
}

#[test]
fn release_is_tied_to_permit_lifetime() {
    let controller = AdmissionController::new(1);
    assert_eq!(controller.running(), 0);

    {
        let _permit = controller.try_admit().unwrap();
        assert_eq!(controller.running(), 1);
        assert!(controller.try_admit().is_err());
    }

    // Exactly one release per admitted job, on scope exit.
    assert_eq!(controller.running(), 0);
    assert!(controller.try_admit().is_ok());
}

#[test]
fn rejection_does_not_mutate_the_counter() {
    let controller = AdmissionController::new(1);
    let _held = controller.try_admit().unwrap();

    for _ in 0..10 {
        assert!(controller.try_admit().is_err());
    }
    assert_eq!(controller.running(), 1);
}
