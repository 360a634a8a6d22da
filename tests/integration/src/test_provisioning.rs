//! Lazy provisioning scenarios.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tablegate_core::memory::MemoryStore;
    use tablegate_core::{
        AdminClient, KeyAttribute, ProbePolicy, TableConfig, TableError, TableSchema,
    };
    use tablegate_model::input::DescribeTableInput;
    use tablegate_model::{AttributeValue, StoreErrorCode, item};

    use crate::{CountingClient, count, counting_factory, counting_factory_with, test_table_name};

    #[tokio::test]
    async fn test_should_create_and_seed_on_first_get() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let name = test_table_name("seed");
        let table = factory.table(
            TableSchema::new(&name, KeyAttribute::number("id"))
                .with_initial_items(vec![item! { "id" => 1, "v" => "a" }]),
        );

        let found = table.get(AttributeValue::from(1), None).await?;

        assert_eq!(found, Some(item! { "id" => 1, "v" => "a" }));
        assert_eq!(count(&client.calls.create), 1);
        assert_eq!(count(&client.calls.batch), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_provision_only_once_across_calls() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(
            TableSchema::new(test_table_name("once"), KeyAttribute::number("id"))
                .with_initial_items(vec![item! { "id" => 1 }]),
        );

        table.get_all().await?;
        table.get(AttributeValue::from(1), None).await?;
        table.delete(AttributeValue::from(2), None).await?;

        assert_eq!(count(&client.calls.create), 1);
        assert_eq!(count(&client.calls.batch), 1);
        assert_eq!(count(&client.calls.describe), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_not_create_existing_table() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let schema = TableSchema::new(test_table_name("exists"), KeyAttribute::number("id"))
            .with_initial_items(vec![item! { "id" => 1 }]);
        client
            .store()
            .create_table(schema.to_create_table_input())
            .await?;

        let table = factory.table(schema);
        assert!(table.get_all().await?.is_empty());
        assert_eq!(count(&client.calls.create), 0);
        assert_eq!(count(&client.calls.batch), 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_create_once_for_concurrent_first_calls() -> anyhow::Result<()> {
        let produced = Arc::new(AtomicUsize::new(0));
        let producer_calls = Arc::clone(&produced);
        let (client, factory) = counting_factory_with(
            CountingClient::new(MemoryStore::new()).with_create_delay(Duration::from_millis(20)),
            TableConfig::default(),
        );
        let table = factory.table(
            TableSchema::new(test_table_name("race"), KeyAttribute::number("id"))
                .with_initial_data_fn(move || {
                    producer_calls.fetch_add(1, Ordering::SeqCst);
                    Some((0..10).map(|i| item! { "id" => i }).collect())
                }),
        );

        let calls = (0..8).map(|_| {
            let table = table.clone();
            tokio::spawn(async move { table.get_all().await })
        });
        for result in futures::future::join_all(calls).await {
            assert_eq!(result??.len(), 10);
        }

        assert_eq!(count(&client.calls.create), 1);
        assert_eq!(count(&client.calls.batch), 1);
        assert_eq!(produced.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_share_provisioning_between_handles_of_one_factory() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let schema = TableSchema::new(test_table_name("shared"), KeyAttribute::number("id"));

        let (a, b) = (factory.table(schema.clone()), factory.table(schema));
        let (ra, rb) = tokio::join!(a.provision(), b.provision());
        ra?;
        rb?;

        assert_eq!(count(&client.calls.create), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_surface_probe_errors_by_default() {
        let (client, factory) = counting_factory(TableConfig::default());
        client.fail_probes_with(Some(StoreErrorCode::AccessDeniedException));
        let table = factory.table(TableSchema::new(
            test_table_name("denied"),
            KeyAttribute::number("id"),
        ));

        let err = table
            .get(AttributeValue::from(1), None)
            .await
            .expect_err("probe should fail");

        assert!(matches!(err, TableError::Probe { .. }));
        assert_eq!(
            err.store_error().map(|e| e.code),
            Some(StoreErrorCode::AccessDeniedException)
        );
        assert_eq!(count(&client.calls.create), 0);
        assert_eq!(count(&client.calls.get), 0);
    }

    #[tokio::test]
    async fn test_should_treat_any_probe_error_as_absent_when_configured() -> anyhow::Result<()> {
        let config = TableConfig::builder()
            .probe_policy(ProbePolicy::AnyError)
            .build();
        let (client, factory) = counting_factory(config);
        client.fail_probes_with(Some(StoreErrorCode::InternalServerError));
        let name = test_table_name("legacy");
        let table = factory.table(TableSchema::new(&name, KeyAttribute::number("id")));

        table.provision().await?;

        assert_eq!(count(&client.calls.create), 1);
        client.fail_probes_with(None);
        let described = client
            .describe_table(DescribeTableInput { table_name: name })
            .await?;
        assert!(described.table.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_report_provisioning_failure() {
        let (client, factory) = counting_factory(TableConfig::default());
        let mut schema = TableSchema::new(test_table_name("bad"), KeyAttribute::number("id"));
        schema.billing_mode = tablegate_model::types::BillingMode::Provisioned;

        let err = factory
            .table(schema)
            .provision()
            .await
            .expect_err("invalid create");

        assert!(matches!(err, TableError::Provisioning { .. }));
        assert_eq!(count(&client.calls.create), 1);
    }

    #[tokio::test]
    async fn test_should_wait_for_table_to_become_active() -> anyhow::Result<()> {
        let config = TableConfig::builder().create_wait_interval_ms(1).build();
        let (client, factory) = counting_factory_with(
            CountingClient::new(MemoryStore::new().with_activation_delay(2)),
            config,
        );
        let table = factory.table(
            TableSchema::new(test_table_name("slow"), KeyAttribute::number("id"))
                .with_initial_items(vec![item! { "id" => 1 }]),
        );

        assert_eq!(table.get_all().await?, vec![item! { "id" => 1 }]);
        assert_eq!(count(&client.calls.create), 1);
        Ok(())
    }
}
