// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! These tests run the waiters against an HTTP server that plays back the
//! snapshots of an operation.

#[cfg(test)]
mod tests {
    use google_provider_operation::{Error, checks, common, compute, container, sql_admin};
    use google_provider_operation::{polling_wait_time, waiter::operation_wait};
    use httptest::cycle;
    use httptest::{Expectation, Server, all_of, matchers::*, responders::*};
    use serde_json::{Value, json};
    use std::time::Duration;
    use transport::backoff_policy::BackoffPolicy;
    use transport::exponential_backoff::ExponentialBackoffBuilder;
    use transport::{ClientConfig, SendRequestOptions, send_request};

    type Result<T> = anyhow::Result<T>;

    const TIMEOUT: Duration = Duration::from_secs(30);
    const USER_AGENT: &str = "test-agent/1.0";

    fn test_config(server: &Server) -> ClientConfig {
        ClientConfig::new()
            .with_backoff_policy(
                ExponentialBackoffBuilder::new()
                    .with_initial_delay(Duration::from_millis(1))
                    .with_maximum_delay(Duration::from_millis(1))
                    .clamp(),
            )
            .with_poll_interval(Duration::from_millis(1))
            .with_compute_base_path(server.url_str("/compute/v1/"))
            .with_container_base_path(server.url_str("/container/v1/"))
            .with_sql_base_path(server.url_str("/sql/v1beta4/"))
            .with_logging_base_path(server.url_str("/logging/v2/"))
    }

    fn reply(status: u16, body: Value) -> impl Responder {
        status_code(status)
            .insert_header("Content-Type", "application/json")
            .body(body.to_string())
    }

    fn compute_op(status: &str) -> Value {
        json!({
            "kind": "compute#operation",
            "name": "operation-123",
            "status": status,
            "zone": "https://www.googleapis.com/compute/v1/projects/my-project/zones/us-central1-a",
            "operationType": "insert",
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_zonal() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path(
                    "GET",
                    "/compute/v1/projects/my-project/zones/us-central1-a/operations/operation-123"
                ),
                request::headers(contains(("user-agent", USER_AGENT))),
            ])
            .times(3)
            .respond_with(cycle![
                reply(200, compute_op("PENDING")),
                reply(200, compute_op("RUNNING")),
                reply(200, compute_op("DONE")),
            ]),
        );
        compute::compute_operation_wait_time(
            &test_config(&server),
            compute_op("PENDING"),
            "my-project",
            "Creating Instance",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_regional() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/compute/v1/projects/my-project/regions/us-east1/operations/operation-123",
            ))
            .respond_with(reply(200, json!({"name": "operation-123", "status": "DONE"}))),
        );
        let op = json!({
            "name": "operation-123",
            "status": "RUNNING",
            "region": "https://www.googleapis.com/compute/v1/projects/my-project/regions/us-east1",
        });
        compute::compute_operation_wait_time(
            &test_config(&server),
            op,
            "my-project",
            "Creating Subnetwork",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_global() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/compute/v1/projects/my-project/global/operations/operation-123",
            ))
            .respond_with(reply(200, json!({"name": "operation-123", "status": "DONE"}))),
        );
        let op = json!({"name": "operation-123", "status": "PENDING"});
        compute::compute_operation_wait_time(
            &test_config(&server),
            op,
            "my-project",
            "Creating Network",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_organization() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/compute/v1/locations/global/operations/operation-123"),
                request::query(url_decoded(contains(("parentId", "organizations/123")))),
            ])
            .respond_with(reply(
                200,
                json!({"name": "operation-123", "status": "DONE", "targetLink": "policy-1"}),
            )),
        );
        let op = json!({"name": "operation-123", "status": "RUNNING"});
        let done = compute::compute_org_operation_wait_time_with_response(
            &test_config(&server),
            op,
            "organizations/123",
            "Creating SecurityPolicy",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        assert_eq!(done.status, "DONE");
        assert_eq!(done.target_link, "policy-1");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_error() -> Result<()> {
        let server = Server::run();
        let mut failed = compute_op("DONE");
        failed["error"] = json!({"errors": [{
            "code": "QUOTA_EXCEEDED",
            "message": "Quota 'CPUS' exceeded.",
        }]});
        server.expect(
            Expectation::matching(request::method("GET")).respond_with(reply(200, failed)),
        );
        let err = compute::compute_operation_wait_time(
            &test_config(&server),
            compute_op("RUNNING"),
            "my-project",
            "Creating Instance",
            USER_AGENT,
            TIMEOUT,
        )
        .await
        .expect_err("the operation failed");
        assert!(!err.is_timeout(), "{err:?}");
        assert_eq!(err.activity(), "Creating Instance");
        let source = err.transport_error().expect("failed waits have a source");
        let op = source.operation_error().expect("an operation error");
        assert_eq!(op.errors[0].code, "QUOTA_EXCEEDED");
        assert!(err.to_string().contains("Quota 'CPUS' exceeded."), "{err}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_not_found_is_retried() -> Result<()> {
        let server = Server::run();
        let not_found = json!({"error": {"code": 404, "message": "operation not found"}});
        server.expect(
            Expectation::matching(request::method("GET"))
                .times(2)
                .respond_with(cycle![reply(404, not_found), reply(200, compute_op("DONE"))]),
        );
        compute::compute_operation_wait_time(
            &test_config(&server),
            compute_op("RUNNING"),
            "my-project",
            "Creating Instance",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        Ok(())
    }

    // Retries in the transport always run out, so each 500 reaches the waiter.
    #[derive(Debug)]
    struct NoRetries;

    impl BackoffPolicy for NoRetries {
        fn on_failure(&self, _loop_start: std::time::Instant, _attempt_count: u32) -> Duration {
            Duration::from_secs(60)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_server_errors_while_polling() -> Result<()> {
        let server = Server::run();
        let unavailable = json!({"error": {"code": 500, "message": "backend error"}});
        server.expect(
            Expectation::matching(request::method("GET"))
                .times(4)
                .respond_with(cycle![
                    reply(500, unavailable.clone()),
                    reply(500, unavailable.clone()),
                    reply(500, unavailable),
                    reply(200, compute_op("DONE")),
                ]),
        );
        let config = test_config(&server)
            .with_backoff_policy(NoRetries)
            .with_request_timeout(Duration::from_secs(5));
        compute::compute_operation_wait_time(
            &config,
            compute_op("RUNNING"),
            "my-project",
            "Creating Instance",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_permission_denied() -> Result<()> {
        let server = Server::run();
        let denied = json!({"error": {"code": 403, "message": "permission denied"}});
        server.expect(
            Expectation::matching(request::method("GET")).respond_with(reply(403, denied)),
        );
        let err = compute::compute_operation_wait_time(
            &test_config(&server),
            compute_op("RUNNING"),
            "my-project",
            "Creating Instance",
            USER_AGENT,
            TIMEOUT,
        )
        .await
        .expect_err("a 403 is fatal");
        let source = err.transport_error().expect("failed waits have a source");
        assert_eq!(source.http_status_code(), Some(403), "{err:?}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn already_done() -> Result<()> {
        // No expectations, any request fails the test.
        let server = Server::run();
        compute::compute_operation_wait_time(
            &test_config(&server),
            compute_op("DONE"),
            "my-project",
            "Creating Instance",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn malformed_operation() -> Result<()> {
        let server = Server::run();
        let err = compute::compute_operation_wait_time(
            &test_config(&server),
            json!({"name": 42}),
            "my-project",
            "Creating Instance",
            USER_AGENT,
            TIMEOUT,
        )
        .await
        .expect_err("the operation cannot be parsed");
        let source = err.transport_error().expect("failed waits have a source");
        assert!(source.is_deserialization(), "{err:?}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timeout() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method("GET"))
                .times(1..)
                .respond_with(reply(200, compute_op("RUNNING"))),
        );
        let err = compute::compute_operation_wait_time(
            &test_config(&server),
            compute_op("RUNNING"),
            "my-project",
            "Creating Instance",
            USER_AGENT,
            Duration::from_millis(50),
        )
        .await
        .expect_err("the operation never completes");
        match err {
            Error::Timeout {
                activity,
                last_state,
                ..
            } => {
                assert_eq!(activity, "Creating Instance");
                assert_eq!(last_state.as_deref(), Some("RUNNING"));
            }
            e => panic!("expected a timeout, got {e:?}"),
        }
        Ok(())
    }

    fn container_op(status: &str) -> Value {
        json!({
            "name": "operation-456",
            "operationType": "CREATE_CLUSTER",
            "status": status,
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn container() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path(
                    "GET",
                    "/container/v1/projects/my-project/locations/us-central1/operations/operation-456"
                ),
                request::headers(contains(("x-goog-user-project", "my-project"))),
            ])
            .times(2)
            .respond_with(cycle![
                reply(200, container_op("RUNNING")),
                reply(200, container_op("DONE")),
            ]),
        );
        let config = test_config(&server).with_user_project_override(true);
        container::container_operation_wait(
            &config,
            container_op("PENDING"),
            "my-project",
            "us-central1",
            "Creating GKE cluster",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn container_aborting() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method("GET"))
                .respond_with(reply(200, container_op("ABORTING"))),
        );
        let err = container::container_operation_wait(
            &test_config(&server),
            container_op("RUNNING"),
            "my-project",
            "us-central1",
            "Deleting GKE cluster",
            USER_AGENT,
            TIMEOUT,
        )
        .await
        .expect_err("ABORTING is not a terminal success");
        assert!(!err.is_timeout(), "{err:?}");
        assert!(err.to_string().contains("ABORTING"), "{err}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sql_admin() -> Result<()> {
        let server = Server::run();
        let failed = json!({
            "name": "op-789",
            "status": "DONE",
            "error": {"errors": [{"code": "ERROR_RDBMS", "message": "database is in use"}]},
        });
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/sql/v1beta4/projects/my-project/operations/op-789",
            ))
            .respond_with(reply(200, failed)),
        );
        let err = sql_admin::sql_admin_operation_wait_time(
            &test_config(&server),
            json!({"name": "op-789", "status": "PENDING"}),
            "my-project",
            "Deleting Database",
            USER_AGENT,
            TIMEOUT,
        )
        .await
        .expect_err("the operation failed");
        assert!(err.to_string().contains("database is in use"), "{err}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn logging_with_response() -> Result<()> {
        let server = Server::run();
        let name = "projects/my-project/locations/global/operations/op-1";
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/logging/v2/projects/my-project/locations/global/operations/op-1",
            ))
            .times(2)
            .respond_with(cycle![
                reply(200, json!({"name": name})),
                reply(200, json!({"name": name, "done": true, "response": {"name": "link-1"}})),
            ]),
        );
        let response = common::logging_operation_wait_time_with_response(
            &test_config(&server),
            json!({"name": name, "done": false}),
            "my-project",
            "Creating Link",
            USER_AGENT,
            TIMEOUT,
        )
        .await?;
        assert_eq!(response, Some(json!({"name": "link-1"})));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dcl_self_link() -> Result<()> {
        let server = Server::run();
        let self_link = server.url_str("/other/v1/operations/op-2");
        server.expect(
            Expectation::matching(request::method_path("GET", "/other/v1/operations/op-2"))
                .respond_with(reply(
                    200,
                    json!({"name": "op-2", "done": true, "error": {"code": 9, "message": "precondition"}}),
                )),
        );
        let err = common::dcl_operation_wait_time(
            &test_config(&server),
            json!({"name": "op-2", "selfLink": self_link}),
            "https://unused.test/v1/",
            "my-project",
            "Creating Trigger",
            USER_AGENT,
            TIMEOUT,
        )
        .await
        .expect_err("the operation failed");
        assert!(err.to_string().contains("precondition"), "{err}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn custom_waiter() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/compute/v1/projects/my-project/global/operations/operation-123",
            ))
            .respond_with(reply(200, json!({"name": "operation-123", "status": "DONE"}))),
        );
        let config = test_config(&server);
        let op = serde_json::from_value(json!({"name": "operation-123", "status": "RUNNING"}))?;
        let mut waiter = compute::ComputeOperationWaiter::new(config, "my-project", op);
        operation_wait(
            &mut waiter,
            "Creating Network",
            TIMEOUT,
            Some(Duration::from_millis(1)),
        )
        .await?;
        assert_eq!(waiter.operation().status, "DONE");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn polling_existence() -> Result<()> {
        let server = Server::run();
        let not_found = json!({"error": {"code": 404, "message": "not found"}});
        server.expect(
            Expectation::matching(request::method_path("GET", "/topics/t1"))
                .times(2)
                .respond_with(cycle![
                    reply(404, not_found),
                    reply(200, json!({"name": "t1"})),
                ]),
        );
        let config = test_config(&server);
        let url = server.url_str("/topics/t1");
        let read = async || {
            send_request(
                &config,
                SendRequestOptions::new(http::Method::GET, url.clone()),
            )
            .await
        };
        polling_wait_time(
            read,
            checks::poll_check_for_existence,
            "Creating Topic",
            TIMEOUT,
            1,
        )
        .await?;
        Ok(())
    }
}
