//! Client Module Tests
//!
//! ## Test Scopes
//! - **Cache**: epoch invalidation and the high-water floor.
//! - **Session**: read-your-writes, conflicts, monotonic reads, replica fall-through.
//! - **Client node**: the HTTP surface of a session.

#[cfg(test)]
mod tests {
    use crate::client::cache::VersionedCache;
    use crate::client::protocol::{
        ClientGetResponse, ClientPutRequest, ClientPutResponse, InvalidateResponse, LinkRequest,
        LinkResponse,
    };
    use crate::client::session::{ClientError, ClientSession, ReadSource};
    use crate::clock::ProcessId;
    use crate::server::{client_router, spawn};
    use crate::storage::protocol::{ENDPOINT_EPOCH, ENDPOINT_PUT, EpochResponse};
    use crate::storage::record::Record;
    use crate::testkit::{TestCluster, closed_addr, full_mesh, test_timeouts, writer_clock};
    use crate::topology::transport::{CallPolicy, PeerClient};
    use axum::{
        Json, Router,
        http::StatusCode,
        routing::{get, post},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    fn session_on(cluster: &TestCluster, id: u32, replicas: &[u32]) -> ClientSession {
        ClientSession::with_replicas(
            ProcessId(id),
            replicas.iter().map(|r| (ProcessId(*r), cluster.addrs[*r as usize])),
            test_timeouts(),
        )
        .unwrap()
    }

    // ============================================================
    // CACHE TESTS
    // ============================================================

    #[test]
    fn test_newer_epoch_clears_entries_but_keeps_floor() {
        let mut cache = VersionedCache::new();
        let seen = Record::new("seen", writer_clock(2, 3));
        cache.insert("x", seen.clone());

        assert!(!cache.observe_epoch(0));
        assert!(cache.observe_epoch(2));
        assert!(cache.is_empty());
        assert!(!cache.observe_epoch(1), "Older epochs are ignored");
        assert_eq!(cache.known_epoch(), 2);

        let older = Record::new("older", writer_clock(2, 1));
        assert_eq!(cache.floor("x", Some(older)), Some(seen.clone()));
        assert_eq!(cache.floor("x", None), Some(seen));
    }

    #[test]
    fn test_pending_write_does_not_raise_floor() {
        let mut cache = VersionedCache::new();
        let pending = Record::new("pending", writer_clock(5, 1));
        cache.insert_pending("x", pending.clone());

        assert_eq!(cache.get("x"), Some(&pending));

        cache.clear();
        let stored = Record::new("stored", writer_clock(1, 1));
        assert_eq!(cache.floor("x", Some(stored.clone())), Some(stored));
        assert_eq!(cache.floor("x", None), None);
    }

    #[test]
    fn test_floor_passes_newer_answers_through() {
        let mut cache = VersionedCache::new();
        cache.insert("x", Record::new("old", writer_clock(2, 1)));
        let newer = Record::new("new", writer_clock(2, 2));

        assert_eq!(cache.floor("x", Some(newer.clone())), Some(newer));
        assert_eq!(cache.floor("unseen", None), None);
    }

    // ============================================================
    // SESSION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_read_your_writes_from_cache() {
        let cluster = TestCluster::start(1, &[]).await;
        let mut session = session_on(&cluster, 3, &[0]);

        let put = session.put("x", "mine").await.unwrap();
        assert!(!put.conflict);
        assert_eq!(put.replica, ProcessId(0));

        let read = session.get("x").await.unwrap();
        assert_eq!(read.source, ReadSource::Cache);
        assert_eq!(read.record.unwrap().value(), "mine");
        assert_eq!(cluster.value_at(0, "x").await.as_deref(), Some("mine"));
    }

    #[tokio::test]
    async fn test_losing_put_caches_authoritative_record() {
        let cluster = TestCluster::start(1, &[]).await;
        cluster
            .node(0)
            .store
            .put("x".to_string(), "theirs".to_string(), writer_clock(9, 1))
            .await
            .unwrap();
        let mut session = session_on(&cluster, 2, &[0]);

        let put = session.put("x", "mine").await.unwrap();

        assert!(put.conflict);
        assert_eq!(put.record.value(), "theirs");
        assert_eq!(session.cached("x").unwrap().value(), "theirs");
        assert_eq!(session.get("x").await.unwrap().record.unwrap().value(), "theirs");
    }

    #[tokio::test]
    async fn test_failed_put_does_not_pin_later_reads() {
        let cluster = TestCluster::start(1, &[]).await;
        cluster
            .node(0)
            .store
            .put("k".to_string(), "real".to_string(), writer_clock(1, 1))
            .await
            .unwrap();

        // A replica that answers its epoch but refuses every write.
        let refusing = Router::new()
            .route(ENDPOINT_EPOCH, get(|| async { Json(EpochResponse { epoch: 0 }) }))
            .route(
                ENDPOINT_PUT,
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for writes") }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let refusing_addr = spawn(listener, refusing).unwrap();

        let mut session =
            ClientSession::with_replicas(ProcessId(3), vec![(ProcessId(2), refusing_addr)], test_timeouts())
                .unwrap();
        assert!(matches!(session.put("k", "phantom").await, Err(ClientError::Rejected(_))));

        session.unlink(ProcessId(2));
        session.link(ProcessId(0), cluster.addrs[0]);
        session.invalidate();

        let read = session.get("k").await.unwrap();
        assert_eq!(read.source, ReadSource::Replica(ProcessId(0)));
        assert_eq!(read.record.unwrap().value(), "real");
    }

    #[tokio::test]
    async fn test_stabilization_invalidates_cache_once() {
        let cluster = TestCluster::start(2, &full_mesh(2)).await;
        let mut session = session_on(&cluster, 4, &[0]);
        session.put("x", "v").await.unwrap();

        cluster.node(0).stabilizer.init_stabilize().await.unwrap();

        let first = session.get("x").await.unwrap();
        assert_eq!(first.source, ReadSource::Replica(ProcessId(0)), "Epoch moved, cache must miss");
        assert_eq!(first.record.unwrap().value(), "v");
        assert_eq!(session.known_epoch(), 1);

        let second = session.get("x").await.unwrap();
        assert_eq!(second.source, ReadSource::Cache);
    }

    #[tokio::test]
    async fn test_sequential_writes_across_replicas_latest_wins() {
        let cluster = TestCluster::start(2, &full_mesh(2)).await;
        let mut session = session_on(&cluster, 5, &[0]);

        session.put("x", "a").await.unwrap();
        session.unlink(ProcessId(0));
        session.link(ProcessId(1), cluster.addrs[1]);
        session.put("x", "b").await.unwrap();

        cluster.node(0).stabilizer.init_stabilize().await.unwrap();

        assert_eq!(cluster.value_at(0, "x").await.as_deref(), Some("b"));
        assert_eq!(cluster.value_at(1, "x").await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_monotonic_reads_across_replicas() {
        let cluster = TestCluster::start(2, &[]).await;
        cluster
            .node(1)
            .store
            .put("x".to_string(), "stale".to_string(), writer_clock(1, 1))
            .await
            .unwrap();
        let mut session = session_on(&cluster, 3, &[0]);
        session.put("x", "fresh").await.unwrap();

        // Switch to a replica that never saw the write and force a remote read.
        session.unlink(ProcessId(0));
        session.link(ProcessId(1), cluster.addrs[1]);
        session.invalidate();

        let read = session.get("x").await.unwrap();
        assert_eq!(read.source, ReadSource::Replica(ProcessId(1)));
        assert_eq!(read.record.unwrap().value(), "fresh");
    }

    #[tokio::test]
    async fn test_absent_key_is_not_cached() {
        let cluster = TestCluster::start(1, &[]).await;
        let mut session = session_on(&cluster, 3, &[0]);

        for _ in 0..2 {
            let read = session.get("missing").await.unwrap();
            assert!(read.record.is_none());
            assert_eq!(read.source, ReadSource::Replica(ProcessId(0)));
        }
    }

    #[tokio::test]
    async fn test_unlinked_session_has_no_replicas() {
        let mut session = ClientSession::new(ProcessId(3), test_timeouts()).unwrap();

        assert!(matches!(session.put("x", "v").await, Err(ClientError::NoReplicas(_))));
        assert!(matches!(session.get("x").await, Err(ClientError::NoReplicas(_))));
    }

    #[tokio::test]
    async fn test_cache_serves_reads_while_offline() {
        let cluster = TestCluster::start(1, &[]).await;
        let mut session = session_on(&cluster, 3, &[0]);
        session.put("x", "v").await.unwrap();
        session.unlink(ProcessId(0));

        let read = session.get("x").await.unwrap();
        assert_eq!(read.source, ReadSource::Cache);

        assert!(matches!(session.get("other").await, Err(ClientError::NoReplicas(_))));
    }

    #[tokio::test]
    async fn test_unreachable_replica_is_skipped() {
        let cluster = TestCluster::start(1, &[]).await;
        let mut session = session_on(&cluster, 3, &[0]);
        session.link(ProcessId(5), closed_addr().await);

        // Replica order is random; every call must land on the live one.
        for i in 0..5 {
            let put = session.put("x", &format!("v{}", i)).await.unwrap();
            assert_eq!(put.replica, ProcessId(0));
        }

        session.unlink(ProcessId(0));
        assert!(matches!(session.put("x", "lost").await, Err(ClientError::Unreachable(_))));
    }

    // ============================================================
    // CLIENT NODE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_client_node_http_surface() {
        let cluster = TestCluster::start(1, &[]).await;
        let session = ClientSession::new(ProcessId(6), test_timeouts()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = spawn(listener, client_router(Arc::new(Mutex::new(session)))).unwrap();
        let http = PeerClient::new();
        let policy = CallPolicy::once(Duration::from_secs(2));

        let linked: LinkResponse = http
            .post_json(
                addr,
                "/link",
                &LinkRequest {
                    replica: ProcessId(0),
                    addr: cluster.addrs[0],
                },
                policy,
            )
            .await
            .unwrap();
        assert!(linked.changed);
        assert_eq!(linked.replicas, vec![ProcessId(0)]);

        let put: ClientPutResponse = http
            .post_json(
                addr,
                "/put",
                &ClientPutRequest {
                    key: "x".to_string(),
                    value: "v".to_string(),
                },
                policy,
            )
            .await
            .unwrap();
        assert!(!put.conflict);
        assert_eq!(put.value, "v");

        let cleared: InvalidateResponse = http.post_json(addr, "/invalidate", &(), policy).await.unwrap();
        assert_eq!(cleared.cleared, 1);

        let get: ClientGetResponse = http.get_json(addr, "/get/x", policy).await.unwrap();
        assert_eq!(get.value.as_deref(), Some("v"));
        assert_eq!(get.replica, Some(ProcessId(0)));
    }
}
