use tagscope_config::{Aggregation, Postgres};
use tagscope_domain::{Aspect, StoreRef};
use tagscope_service::{Backends, TaggingService};
use tagscope_storage::{ChangeLog, NodeStore, db::Db, nodes};
use tagscope_testkit::TestDatabase;

#[tokio::test]
#[ignore = "Requires external Postgres. Set TAGSCOPE_PG_DSN to run."]
async fn committed_tags_reach_the_scope_cache() {
	let Some(base_dsn) = tagscope_testkit::env_dsn() else {
		eprintln!("Skipping committed_tags_reach_the_scope_cache; set TAGSCOPE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let store = StoreRef::default();
	let scope = nodes::create_node(&db, &store, None, &[Aspect::TagScope])
		.await
		.expect("Failed to create scope.");
	let doc = nodes::create_node(&db, &store, Some(&scope), &[])
		.await
		.expect("Failed to create node.");
	let aggregation = Aggregation { dispatch: "deferred".to_string(), ..Default::default() };
	let service = TaggingService::new(Backends::postgres(db.clone()), &aggregation)
		.expect("Failed to build service.");
	let mut tx = service.begin();

	service.add_tags(&mut tx, &doc, &["Alpha", "beta"]).await.expect("Failed to add tags.");
	tx.commit().await.expect("Failed to commit.");

	assert_eq!(db.list_pending_nodes(10).await.expect("Failed to list nodes."), vec![scope.to_string()]);

	let report = service.sweep().await.expect("Failed to sweep.");

	assert_eq!(report.aggregation.records_applied, 1);
	assert_eq!(
		db.read_tag_cache(&scope).await.expect("Failed to read cache.").as_deref(),
		Some("alpha|1\nbeta|1")
	);
	assert!(db.list_pending_nodes(10).await.expect("Failed to list nodes.").is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
