mod test_support;

use serde_json::json;
use test_support::{
    create_account, open_as_admin, request_err, request_ok, spawn_sidecar, str_field,
};

#[test]
fn second_payment_conflicts_and_keeps_amount_and_date() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_ws, admin) = open_as_admin(&mut stdin, &mut reader, "campusd-fees");
    let (student, student_profile) =
        create_account(&mut stdin, &mut reader, &admin, "student", "s-1", "Ada");
    let (other, _) = create_account(&mut stdin, &mut reader, &admin, "student", "s-2", "Bob");

    let fee = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        Some(&admin),
        "fees.record",
        json!({
            "studentId": student_profile,
            "amount": 1250.50,
            "description": "Tuition",
            "dueDate": "2024-12-01"
        }),
    );
    let fee_id = str_field(&fee, "id");
    assert_eq!(
        fee.get("amountCents").and_then(|v| v.as_i64()),
        Some(125_050)
    );
    assert_eq!(fee.get("status").and_then(|v| v.as_str()), Some("unpaid"));

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        Some(&admin),
        "fees.record",
        json!({
            "studentId": student_profile,
            "amount": 249.50,
            "description": "Lab",
            "status": "paid"
        }),
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        Some(&other),
        "fees.pay",
        json!({ "feeId": fee_id }),
    );
    assert_eq!(code, "forbidden");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        Some(&admin),
        "fees.record",
        json!({ "studentId": student_profile, "amount": 0, "description": "Nothing" }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "4b",
        Some(&admin),
        "fees.record",
        json!({ "studentId": student_profile, "amount": 5.0e16, "description": "Typo" }),
    );
    assert_eq!(code, "bad_params");

    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        Some(&student),
        "fees.markPending",
        json!({ "feeId": fee_id }),
    );
    let paid = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        Some(&student),
        "fees.pay",
        json!({ "feeId": fee_id }),
    );
    let payment_date = str_field(&paid, "paymentDate");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "7",
        Some(&student),
        "fees.pay",
        json!({ "feeId": fee_id }),
    );
    assert_eq!(code, "conflict");

    let listed = request_ok(&mut stdin, &mut reader, "8", Some(&student), "fees.list", json!({}));
    let fees = listed.get("fees").and_then(|v| v.as_array()).expect("fees");
    let stored = fees.iter().find(|f| str_field(f, "id") == fee_id).expect("fee row");
    assert_eq!(
        stored.get("amountCents").and_then(|v| v.as_i64()),
        Some(125_050)
    );
    assert_eq!(str_field(stored, "paymentDate"), payment_date);

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        Some(&student),
        "fees.summary",
        json!({}),
    );
    assert_eq!(
        summary.get("totalFees").and_then(|v| v.as_f64()),
        Some(1500.0)
    );
    assert_eq!(
        summary.get("paidPercentage").and_then(|v| v.as_f64()),
        Some(100.0)
    );
}
