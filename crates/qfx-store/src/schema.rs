diesel::table! {
    transactions (hash) {
        hash -> Text,
        nonce -> Int8,
        created_at -> Int8,

        from_address -> Nullable<Text>,
        to_address -> Nullable<Text>,
        transaction_type -> Text,

        data -> Bytea,
        /// Decimal string; `Balance` is a u128 and has no native Postgres type.
        value -> Text,

        status -> Text,

        num_of_initial_validators -> Int4,
        config_rotation_rounds -> Int4,
        execution_mode -> Text,

        consensus_data -> Jsonb,
        consensus_history -> Jsonb,

        appealed -> Bool,
        appeal_undetermined -> Bool,
        appeal_leader_timeout -> Bool,
        appeal_validators_timeout -> Bool,
        appeal_failed -> Int4,
        timestamp_appeal -> Nullable<Int8>,
        timestamp_awaiting_finalization -> Nullable<Int8>,
        appeal_processing_time -> Int8,

        contract_snapshot -> Nullable<Jsonb>,

        triggered_by_hash -> Nullable<Text>,
        triggered_transactions -> Jsonb,
        triggered_on -> Nullable<Text>,

        blocked_at -> Nullable<Int8>,
        worker_id -> Nullable<Text>,

        rotation_count -> Int4,
        leader_timeout_validators -> Jsonb,

        result -> Nullable<Text>,
    }
}

diesel::table! {
    contract_states (to_address) {
        to_address -> Text,
        accepted -> Jsonb,
        finalized -> Jsonb,
    }
}

diesel::table! {
    no_validator_backoffs (transaction_hash) {
        transaction_hash -> Text,
        count -> Int4,
        last_attempt -> Int8,
    }
}

diesel::table! {
    validators (address) {
        address -> Text,
        private_key -> Text,
        /// Decimal string; `Balance` is a u128 and has no native Postgres type.
        stake -> Text,
        llm_provider -> Jsonb,
        fallback -> Nullable<Jsonb>,
    }
}

diesel::table! {
    accounts (address) {
        address -> Text,
        /// Decimal string; `Balance` is a u128 and has no native Postgres type.
        balance -> Text,
    }
}
