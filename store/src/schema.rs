//! SQLite schema. Applied idempotently at open.

/// Statements executed in order inside one transaction.
pub(crate) const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS providers (
        id INTEGER PRIMARY KEY,
        kind TEXT NOT NULL,
        base_url TEXT NOT NULL,
        UNIQUE (kind, base_url)
    )",
    "CREATE TABLE IF NOT EXISTS installations (
        id INTEGER PRIMARY KEY,
        provider_id INTEGER NOT NULL REFERENCES providers(id),
        external_id TEXT NOT NULL,
        UNIQUE (provider_id, external_id)
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        provider_id INTEGER NOT NULL REFERENCES providers(id),
        external_id TEXT NOT NULL,
        login TEXT NOT NULL,
        UNIQUE (provider_id, external_id)
    )",
    "CREATE TABLE IF NOT EXISTS repos (
        id INTEGER PRIMARY KEY,
        provider_id INTEGER NOT NULL REFERENCES providers(id),
        external_id TEXT NOT NULL,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        full_name TEXT NOT NULL,
        default_branch TEXT NOT NULL,
        UNIQUE (provider_id, external_id)
    )",
    "CREATE TABLE IF NOT EXISTS repo_installations (
        repo_id INTEGER NOT NULL REFERENCES repos(id),
        installation_id INTEGER NOT NULL REFERENCES installations(id),
        UNIQUE (repo_id, installation_id)
    )",
    "CREATE TABLE IF NOT EXISTS pull_requests (
        id INTEGER PRIMARY KEY,
        repo_id INTEGER NOT NULL REFERENCES repos(id),
        number INTEGER NOT NULL,
        external_id TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        body TEXT NOT NULL DEFAULT '',
        state TEXT NOT NULL DEFAULT 'open',
        base_ref TEXT NOT NULL DEFAULT '',
        head_ref TEXT NOT NULL DEFAULT '',
        base_sha TEXT NOT NULL DEFAULT '',
        head_sha TEXT NOT NULL DEFAULT '',
        draft INTEGER NOT NULL DEFAULT 0,
        author_id INTEGER REFERENCES users(id),
        UNIQUE (repo_id, number)
    )",
    "CREATE TABLE IF NOT EXISTS review_runs (
        id INTEGER PRIMARY KEY,
        pull_request_id INTEGER NOT NULL REFERENCES pull_requests(id),
        head_sha TEXT NOT NULL,
        status TEXT NOT NULL,
        trigger_kind TEXT NOT NULL,
        started_at INTEGER NOT NULL,
        completed_at INTEGER,
        draft_json TEXT,
        final_json TEXT,
        verdicts_json TEXT,
        checks_json TEXT,
        context_pack_json TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_review_runs_pr ON review_runs(pull_request_id, id)",
    "CREATE TABLE IF NOT EXISTS findings (
        id INTEGER PRIMARY KEY,
        pull_request_id INTEGER NOT NULL REFERENCES pull_requests(id),
        run_id INTEGER NOT NULL REFERENCES review_runs(id),
        last_seen_run_id INTEGER NOT NULL REFERENCES review_runs(id),
        status TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        hunk_hash TEXT NOT NULL,
        context_hash TEXT NOT NULL,
        comment_id TEXT,
        comment_key TEXT NOT NULL,
        path TEXT NOT NULL,
        line INTEGER NOT NULL,
        side TEXT NOT NULL,
        severity TEXT NOT NULL,
        category TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        evidence TEXT NOT NULL,
        suggested_patch TEXT,
        rule_id TEXT,
        comment_type TEXT NOT NULL DEFAULT 'inline'
    )",
    "CREATE INDEX IF NOT EXISTS idx_findings_pr_status ON findings(pull_request_id, status)",
    "CREATE TABLE IF NOT EXISTS review_comments (
        id INTEGER PRIMARY KEY,
        pull_request_id INTEGER NOT NULL REFERENCES pull_requests(id),
        finding_id INTEGER REFERENCES findings(id),
        kind TEXT NOT NULL,
        provider_comment_id TEXT NOT NULL,
        body TEXT NOT NULL,
        url TEXT,
        UNIQUE (pull_request_id, provider_comment_id)
    )",
    "CREATE TABLE IF NOT EXISTS feedback (
        id INTEGER PRIMARY KEY,
        review_run_id INTEGER NOT NULL REFERENCES review_runs(id),
        feedback_type TEXT NOT NULL,
        sentiment TEXT,
        action TEXT,
        comment_id TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}'
    )",
    "CREATE TABLE IF NOT EXISTS file_index (
        id INTEGER PRIMARY KEY,
        repo_id INTEGER NOT NULL REFERENCES repos(id),
        path TEXT NOT NULL,
        language TEXT,
        content_hash TEXT NOT NULL,
        size INTEGER NOT NULL,
        is_pattern INTEGER NOT NULL DEFAULT 0,
        UNIQUE (repo_id, path, is_pattern)
    )",
    "CREATE TABLE IF NOT EXISTS symbols (
        id INTEGER PRIMARY KEY,
        repo_id INTEGER NOT NULL REFERENCES repos(id),
        file_id INTEGER NOT NULL REFERENCES file_index(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        signature TEXT NOT NULL DEFAULT '',
        hash TEXT NOT NULL DEFAULT ''
    )",
    "CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_repo_name ON symbols(repo_id, name)",
    "CREATE TABLE IF NOT EXISTS symbol_refs (
        id INTEGER PRIMARY KEY,
        repo_id INTEGER NOT NULL REFERENCES repos(id),
        file_id INTEGER NOT NULL REFERENCES file_index(id) ON DELETE CASCADE,
        ref_name TEXT NOT NULL,
        line INTEGER NOT NULL,
        kind TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_symbol_refs_file ON symbol_refs(file_id)",
    "CREATE TABLE IF NOT EXISTS embeddings (
        id INTEGER PRIMARY KEY,
        repo_id INTEGER NOT NULL REFERENCES repos(id),
        file_id INTEGER REFERENCES file_index(id) ON DELETE CASCADE,
        symbol_id INTEGER REFERENCES symbols(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        vector BLOB NOT NULL,
        text TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_embeddings_repo ON embeddings(repo_id, id)",
    "CREATE TABLE IF NOT EXISTS graph_nodes (
        id INTEGER PRIMARY KEY,
        repo_id INTEGER NOT NULL REFERENCES repos(id),
        node_type TEXT NOT NULL,
        key TEXT NOT NULL,
        file_id INTEGER,
        symbol_id INTEGER,
        data TEXT NOT NULL DEFAULT '{}',
        UNIQUE (repo_id, node_type, key)
    )",
    "CREATE TABLE IF NOT EXISTS graph_edges (
        id INTEGER PRIMARY KEY,
        repo_id INTEGER NOT NULL REFERENCES repos(id),
        from_node_id INTEGER NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
        to_node_id INTEGER NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
        edge_type TEXT NOT NULL,
        weight INTEGER NOT NULL DEFAULT 1,
        examples TEXT NOT NULL DEFAULT '[]',
        source TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_graph_edges_repo ON graph_edges(repo_id)",
    "CREATE TABLE IF NOT EXISTS repo_analytics (
        repo_id INTEGER PRIMARY KEY REFERENCES repos(id),
        runs_completed INTEGER NOT NULL DEFAULT 0,
        findings_total INTEGER NOT NULL DEFAULT 0,
        findings_fixed INTEGER NOT NULL DEFAULT 0,
        feedback_positive INTEGER NOT NULL DEFAULT 0,
        feedback_negative INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0
    )",
];
