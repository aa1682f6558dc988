mod test_support;

use serde_json::json;
use test_support::{
    create_account, open_as_admin, request_err, request_ok, spawn_sidecar, str_field,
};

#[test]
fn remarking_a_date_leaves_no_residual_rows() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_ws, admin) = open_as_admin(&mut stdin, &mut reader, "campusd-attendance");
    let (teacher, teacher_profile) =
        create_account(&mut stdin, &mut reader, &admin, "teacher", "t-1", "Teacher");
    let (student_a, a) = create_account(&mut stdin, &mut reader, &admin, "student", "s-a", "Ann");
    let (_, b) = create_account(&mut stdin, &mut reader, &admin, "student", "s-b", "Ben");

    let course = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        Some(&admin),
        "courses.create",
        json!({ "code": "BIO1", "name": "Biology", "teacherId": teacher_profile }),
    );
    let course_id = str_field(&course, "id");
    for (i, s) in [&a, &b].into_iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("enroll-{i}"),
            Some(&admin),
            "enrollment.enroll",
            json!({ "studentId": s, "courseId": course_id }),
        );
    }

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        Some(&teacher),
        "attendance.mark",
        json!({ "courseId": course_id, "date": "2024-09-02", "records": [
            { "studentId": a, "status": "absent" },
            { "studentId": b, "status": "present" }
        ]}),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        Some(&teacher),
        "attendance.mark",
        json!({ "courseId": course_id, "date": "2024-09-03", "records": [
            { "studentId": a, "status": "present" }
        ]}),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        Some(&teacher),
        "attendance.mark",
        json!({ "courseId": course_id, "date": "2024-09-02", "records": [
            { "studentId": a, "status": "present" }
        ]}),
    );

    let day = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        Some(&teacher),
        "attendance.course",
        json!({ "courseId": course_id, "date": "2024-09-02" }),
    );
    let records = day.get("records").and_then(|v| v.as_array()).expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(str_field(&records[0], "studentId"), a);

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        Some(&student_a),
        "attendance.summary",
        json!({}),
    );
    assert_eq!(
        summary.get("totalClasses").and_then(|v| v.as_i64()),
        Some(2)
    );
    assert_eq!(summary.get("present").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(
        summary.get("presentPercentage").and_then(|v| v.as_f64()),
        Some(100.0)
    );

    let summary_b = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        Some(&admin),
        "attendance.summary",
        json!({ "studentId": b }),
    );
    assert_eq!(
        summary_b.get("totalClasses").and_then(|v| v.as_i64()),
        Some(0)
    );
    assert_eq!(
        summary_b.get("presentPercentage").and_then(|v| v.as_f64()),
        Some(0.0)
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "8",
        Some(&teacher),
        "attendance.mark",
        json!({ "courseId": course_id, "date": "2024-09-04", "records": [
            { "studentId": a, "status": "present" },
            { "studentId": a, "status": "absent" }
        ]}),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "9",
        Some(&teacher),
        "attendance.mark",
        json!({ "courseId": course_id, "date": "09/04/2024", "records": [] }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "10",
        Some(&teacher),
        "attendance.mark",
        json!({ "courseId": course_id, "date": "2024-09-04", "records": [
            { "studentId": a, "status": "late" }
        ]}),
    );
    assert_eq!(code, "bad_params");

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        Some(&admin),
        "reports.attendance",
        json!({}),
    );
    assert_eq!(
        report.pointer("/courses/0/present").and_then(|v| v.as_i64()),
        Some(2)
    );
}
