use employee_api::config::ServiceConfig;
use employee_api::models::{Employee, UploadResponse};
use employee_api::routes::upload::upload_employees;
use employee_api::test_support::{TestDatabase, TestDatabaseError, TestFixtures, TestRocketBuilder};
use rocket::http::{ContentType, Status, StatusClass};
use rocket::local::asynchronous::Client;
use rocket::routes;
use serde_json::Value;

const BOUNDARY: &str = "X-EMPLOYEE-UPLOAD-BOUNDARY";

async fn provision(test_name: &str) -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::Unavailable(reason)) => {
            eprintln!("skipping {test_name}: {reason}");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

async fn client_for(test_db: &TestDatabase) -> Client {
    TestRocketBuilder::new()
        .manage_pg_pool(test_db.pool_clone())
        .manage_config(ServiceConfig {
            default_limit: 30,
            max_limit: 1000,
            max_upload_files: 3,
        })
        .mount_api_routes(routes![upload_employees])
        .async_client()
        .await
}

/// Encode `(filename, contents)` pairs as `file` parts of a multipart body.
fn multipart(files: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (filename, contents) in files {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        body.push_str(&format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
        ));
        body.push_str("Content-Type: text/csv\r\n\r\n");
        body.push_str(contents);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn multipart_content_type() -> ContentType {
    ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
}

#[tokio::test]
async fn upload_applies_every_file() {
    let Some(test_db) = provision("upload success test").await else {
        return;
    };
    let client = client_for(&test_db).await;

    let body = multipart(&[
        (
            "first.csv",
            "# id,login,name,salary\ne0001,hpotter,Harry Potter,1234.00\ne0002,rwesley,Ron Weasley,19234.50\n",
        ),
        ("second.csv", "e0003,ssnape,Severus Snape,4000.0\n"),
    ]);

    let response = client
        .post("/api/v1/users/upload")
        .header(multipart_content_type())
        .body(body)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let payload: UploadResponse = response.into_json().await.expect("upload response");
    assert_eq!(payload.records_applied, 3);
    assert_eq!(payload.message, "Number of employees inserted : 3");

    let fixtures = TestFixtures::new(test_db.pool());
    assert_eq!(fixtures.count().await.expect("count"), 3);
    assert_eq!(
        fixtures.employee("e0002").await.expect("lookup"),
        Some(Employee::new("e0002", "rwesley", "Ron Weasley", 19234.5))
    );

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn failing_file_rolls_back_and_stops_the_import() {
    let Some(test_db) = provision("upload failure test").await else {
        return;
    };
    let client = client_for(&test_db).await;

    let body = multipart(&[
        ("good.csv", "e0001,hpotter,Harry Potter,1234.00\n"),
        ("bad.csv", "e0002,rwesley,Ron Weasley,10\ne0003,broken\n"),
        ("later.csv", "e0004,ssnape,Severus Snape,4000.0\n"),
    ]);

    let response = client
        .post("/api/v1/users/upload")
        .header(multipart_content_type())
        .body(body)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let payload: Value = response.into_json().await.expect("error body");
    assert_eq!(payload["error"], "ImportFailed");
    assert_eq!(payload["recordsApplied"], 1);
    assert!(
        payload["file"]
            .as_str()
            .is_some_and(|file| file.starts_with("bad")),
        "unexpected file: {}",
        payload["file"]
    );
    assert!(
        payload["message"]
            .as_str()
            .is_some_and(|message| message.starts_with("missing employee fields"))
    );

    let fixtures = TestFixtures::new(test_db.pool());
    assert_eq!(fixtures.count().await.expect("count"), 1);
    assert!(fixtures.employee("e0002").await.expect("lookup").is_none());
    assert!(fixtures.employee("e0004").await.expect("lookup").is_none());

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn upload_rejects_empty_and_oversized_requests() {
    let Some(test_db) = provision("upload request validation test").await else {
        return;
    };
    let client = client_for(&test_db).await;

    let response = client
        .post("/api/v1/users/upload")
        .header(multipart_content_type())
        .body(multipart(&[]))
        .dispatch()
        .await;
    assert_eq!(response.status().class(), StatusClass::ClientError);
    drop(response);

    let too_many = multipart(&[
        ("a.csv", "e1,a,A,1\n"),
        ("b.csv", "e2,b,B,1\n"),
        ("c.csv", "e3,c,C,1\n"),
        ("d.csv", "e4,d,D,1\n"),
    ]);
    let response = client
        .post("/api/v1/users/upload")
        .header(multipart_content_type())
        .body(too_many)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    drop(response);

    let response = client
        .post("/api/v1/users/upload")
        .header(multipart_content_type())
        .body(multipart(&[("empty.csv", "# header only\n")]))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let payload: Value = response.into_json().await.expect("error body");
    assert_eq!(payload["recordsApplied"], 0);
    assert_eq!(
        payload["message"],
        "employees added is 0: empty file was uploaded"
    );

    assert_eq!(
        TestFixtures::new(test_db.pool()).count().await.expect("count"),
        0
    );

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}
