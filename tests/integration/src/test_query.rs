//! Query dispatch between indexed queries and ordered scans.

#[cfg(test)]
mod tests {
    use tablegate_core::memory::MemoryStore;
    use tablegate_core::{KeyAttribute, QueryDescriptor, TableConfig, TableHandle, TableSchema};
    use tablegate_model::{AttributeValue, Item, item};

    use crate::{CountingClient, count, counting_factory, counting_factory_with, test_table_name};

    fn ids(items: &[Item], attr: &str) -> Vec<AttributeValue> {
        items.iter().filter_map(|i| i.get(attr).cloned()).collect()
    }

    fn numbers(values: &[i32]) -> Vec<AttributeValue> {
        values.iter().copied().map(AttributeValue::from).collect()
    }

    fn scores() -> Vec<Item> {
        vec![
            item! { "id" => "a", "score" => 3 },
            item! { "id" => "b", "score" => 1 },
            item! { "id" => "c", "score" => 2 },
        ]
    }

    fn messages(name: &str) -> TableSchema {
        TableSchema::new(name, KeyAttribute::string("room"))
            .with_range_key(KeyAttribute::number("at"))
            .with_initial_data_fn(|| {
                Some(
                    (1..=5)
                        .map(|at| item! { "room" => "lobby", "at" => at })
                        .chain([item! { "room" => "attic", "at" => 1 }])
                        .collect(),
                )
            })
    }

    async fn seeded(table: &TableHandle) -> anyhow::Result<()> {
        table.provision().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_should_order_scan_ascending_by_default() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(
            TableSchema::new(test_table_name("asc"), KeyAttribute::string("id"))
                .with_initial_items(scores()),
        );

        let items = table
            .query(&QueryDescriptor::new().order_by("score"))
            .await?;

        assert_eq!(ids(&items, "score"), numbers(&[1, 2, 3]));
        assert_eq!(count(&client.calls.scan), 1);
        assert_eq!(count(&client.calls.query), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_order_scan_descending_and_truncate() -> anyhow::Result<()> {
        let (_, factory) = counting_factory(TableConfig::default());
        let table = factory.table(
            TableSchema::new(test_table_name("desc"), KeyAttribute::string("id"))
                .with_initial_items(scores()),
        );

        let items = table
            .query(&QueryDescriptor::new().order_by("score").descending().max(2))
            .await?;

        assert_eq!(
            ids(&items, "id"),
            vec![AttributeValue::from("a"), AttributeValue::from("c")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_should_keep_store_order_without_orderby() -> anyhow::Result<()> {
        let (_, factory) = counting_factory(TableConfig::default());
        let table = factory.table(
            TableSchema::new(test_table_name("plain"), KeyAttribute::string("id"))
                .with_initial_items(scores()),
        );

        let all = table.get_all().await?;
        let queried = table.query(&QueryDescriptor::new().descending()).await?;

        assert_eq!(queried, all);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_query_partition_when_key_given() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(messages(&test_table_name("rooms")));
        seeded(&table).await?;

        let items = table
            .query(&QueryDescriptor::new().partition_key("lobby"))
            .await?;

        assert_eq!(items.len(), 5);
        assert!(
            items
                .iter()
                .all(|i| i.get("room").and_then(AttributeValue::as_s) == Some("lobby"))
        );
        assert_eq!(count(&client.calls.query), 1);
        assert_eq!(count(&client.calls.scan), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_query_newest_first_with_limit() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(messages(&test_table_name("latest")));
        seeded(&table).await?;

        let items = table
            .query(
                &QueryDescriptor::new()
                    .partition_key("lobby")
                    .descending()
                    .max(2),
            )
            .await?;

        assert_eq!(ids(&items, "at"), numbers(&[5, 4]));
        assert_eq!(count(&client.calls.query), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_follow_pagination_until_exhausted() -> anyhow::Result<()> {
        let (client, factory) = counting_factory_with(
            CountingClient::new(MemoryStore::new()).with_page_size(2),
            TableConfig::default(),
        );
        let table = factory.table(messages(&test_table_name("pages")));
        seeded(&table).await?;

        let lobby = table
            .query(&QueryDescriptor::new().partition_key("lobby"))
            .await?;
        assert_eq!(ids(&lobby, "at"), numbers(&[1, 2, 3, 4, 5]));
        assert_eq!(count(&client.calls.query), 3);

        let everything = table.get_all().await?;
        assert_eq!(everything.len(), 6);
        assert_eq!(count(&client.calls.scan), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_return_empty_for_unknown_partition() -> anyhow::Result<()> {
        let (_, factory) = counting_factory(TableConfig::default());
        let table = factory.table(messages(&test_table_name("empty")));

        let items = table
            .query(&QueryDescriptor::new().partition_key("cellar").max(3))
            .await?;
        assert!(items.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_should_treat_zero_max_alike_in_both_modes() -> anyhow::Result<()> {
        let (client, factory) = counting_factory(TableConfig::default());
        let table = factory.table(messages(&test_table_name("zero")));
        seeded(&table).await?;

        let indexed = table
            .query(&QueryDescriptor::new().partition_key("lobby").max(0))
            .await?;
        let scanned = table
            .query(&QueryDescriptor::new().order_by("at").max(0))
            .await?;

        assert!(indexed.is_empty());
        assert!(scanned.is_empty());
        assert_eq!(count(&client.calls.query), 0);
        Ok(())
    }
}
