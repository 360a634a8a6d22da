//! Primitive operations through a table handle.

#[cfg(test)]
mod tests {
    use tablegate_core::{
        BatchAction, KeyAttribute, TableConfig, TableError, TableSchema, UpdateOutcome,
    };
    use tablegate_model::{AttributeValue, item};

    use crate::{count, counting_factory, test_table_name};

    fn users(name: &str) -> TableSchema {
        TableSchema::new(name, KeyAttribute::string("user_id"))
    }

    #[tokio::test]
    async fn test_should_return_none_for_missing_item() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(users(&test_table_name("missing")));

        assert_eq!(table.get(AttributeValue::from("nobody"), None).await?, None);
        assert_eq!(count(&client.calls.get), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_delete_missing_item_without_error() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(users(&test_table_name("delete")));

        table.delete(AttributeValue::from("nobody"), None).await?;
        assert_eq!(count(&client.calls.delete), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_put_and_delete_item() -> anyhow::Result<()> {
        let (_, factory) = counting_factory(TableConfig::default());
        let table = factory.table(users(&test_table_name("crud")));

        table
            .create(item! { "user_id" => "u1", "name" => "Ada", "bio" => "" })
            .await?;
        assert_eq!(
            table.get(AttributeValue::from("u1"), None).await?,
            Some(item! { "user_id" => "u1", "name" => "Ada" })
        );

        table.delete(AttributeValue::from("u1"), None).await?;
        assert_eq!(table.get(AttributeValue::from("u1"), None).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_merge_update_into_existing_item() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(users(&test_table_name("merge")));
        table
            .create(item! { "user_id" => "u1", "name" => "Ada", "age" => 36 })
            .await?;

        let outcome = table
            .update(
                item! { "age" => 37, "name" => AttributeValue::Null(true) },
                Some(AttributeValue::from("u1")),
                None,
            )
            .await?;

        assert!(matches!(outcome, UpdateOutcome::Updated(_)));
        assert_eq!(count(&client.calls.update), 1);
        assert_eq!(
            table.get(AttributeValue::from("u1"), None).await?,
            Some(item! { "user_id" => "u1", "age" => 37 })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_should_provision_but_not_write_for_key_only_update() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(
            users(&test_table_name("noop")).with_initial_items(vec![item! { "user_id" => "u1" }]),
        );

        let outcome = table.update(item! { "user_id" => "u1" }, None, None).await?;

        assert_eq!(outcome, UpdateOutcome::Unmodified);
        assert_eq!(count(&client.calls.create), 1);
        assert_eq!(count(&client.calls.batch), 1);
        assert_eq!(count(&client.calls.update), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_provision_before_rejecting_missing_sort_value() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(
            TableSchema::new(test_table_name("nosort"), KeyAttribute::string("stream"))
                .with_range_key(KeyAttribute::number("seq")),
        );

        let err = table
            .delete(AttributeValue::from("s"), None)
            .await
            .expect_err("sort value required");

        assert!(matches!(err, TableError::MissingKey { .. }));
        assert_eq!(count(&client.calls.create), 1);
        assert_eq!(count(&client.calls.delete), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_address_composite_keys() -> anyhow::Result<()> {
        let (_, factory) = counting_factory(TableConfig::default());
        let table = factory.table(
            TableSchema::new(test_table_name("events"), KeyAttribute::string("stream"))
                .with_range_key(KeyAttribute::number("seq")),
        );
        table
            .create(item! { "stream" => "s", "seq" => 1, "kind" => "open" })
            .await?;
        table
            .create(item! { "stream" => "s", "seq" => 2, "kind" => "close" })
            .await?;

        let second = table
            .get(AttributeValue::from("s"), Some(AttributeValue::from(2)))
            .await?;
        assert_eq!(
            second.and_then(|i| i.get("kind").cloned()),
            Some(AttributeValue::from("close"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_should_write_rendered_batches() -> anyhow::Result<()> {
        let config = TableConfig::builder().batch_chunk_size(10).build();
        let (client, factory) = counting_factory(config);
        let name = test_table_name("batch");
        let table = factory.table(users(&name));
        table.provision().await?;

        let mut builder = table.batch_builder();
        builder.add_items(
            &name,
            (0..23).map(|i| item! { "user_id" => format!("u{i}") }),
            BatchAction::Add,
        );
        builder.add_items(
            &name,
            vec![item! { "user_id" => "u0" }, item! { "user_id" => "u1" }],
            BatchAction::Delete,
        );
        let requests = builder.render_requests();
        assert_eq!(requests.len(), 3);

        for request in requests {
            let output = table.batch(request).await?;
            assert!(output.unprocessed_items.is_empty());
        }

        assert_eq!(count(&client.calls.batch), 3);
        assert_eq!(table.get_all().await?.len(), 21);
        Ok(())
    }
}
