// Diesel table definitions for the five orchestration tables this crate
// owns. Timestamps are stored as RFC3339 text (not diesel's native
// Timestamp type) so the same string round-trips through JSON/CSV without a
// second conversion layer — mirrors how the teacher repo stores its own
// crawl_urls/crawl_requests timestamps.

diesel::table! {
    crawlers (id) {
        id -> Text,
        name -> Text,
        module_name -> Text,
        base_url -> Text,
        crawler_type -> Text,
        config_file_name -> Text,
        active -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    tasks (id) {
        id -> Text,
        name -> Text,
        crawler_id -> Text,
        is_auto -> Integer,
        is_active -> Integer,
        cron_expression -> Nullable<Text>,
        task_args -> Text,
        scrape_phase -> Text,
        retry_count -> Integer,
        last_run_at -> Nullable<Text>,
        last_run_success -> Nullable<Integer>,
        last_run_message -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    task_history (id) {
        id -> Integer,
        task_id -> Text,
        start_time -> Text,
        end_time -> Nullable<Text>,
        success -> Nullable<Integer>,
        articles_count -> Nullable<Integer>,
        message -> Nullable<Text>,
        task_status -> Text,
    }
}

diesel::table! {
    articles (id) {
        id -> Text,
        title -> Text,
        link -> Text,
        source -> Nullable<Text>,
        source_url -> Nullable<Text>,
        summary -> Nullable<Text>,
        content -> Nullable<Text>,
        category -> Nullable<Text>,
        author -> Nullable<Text>,
        article_type -> Nullable<Text>,
        tags -> Text,
        keywords -> Text,
        published_at -> Nullable<Text>,
        is_ai_related -> Integer,
        is_scraped -> Integer,
        scrape_status -> Text,
        scrape_error -> Nullable<Text>,
        last_scrape_attempt -> Nullable<Text>,
        task_id -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(crawlers, tasks, task_history, articles,);
