//! Query templates for the graph store
//!
//! Every template is a constant. Variable data is always bound with `?`
//! placeholders, never formatted into the text.

// ---------------------------------------------------------------------------
// User nodes
// ---------------------------------------------------------------------------

/// Lookup by username or email; an exact username match wins.
/// Binds: identifier, identifier, identifier
pub const GET_USER_BY_LOGIN: &str = r#"
    SELECT id, name, username, email, password_hash, created_at
    FROM users
    WHERE username = ? OR email = ?
    ORDER BY (username = ?) DESC
    LIMIT 1
"#;

/// Binds: id
pub const USER_EXISTS: &str = "SELECT 1 FROM users WHERE id = ?";

/// Binds: id, name, username, email, password_hash, created_at
pub const INSERT_USER: &str = r#"
    INSERT INTO users (id, name, username, email, password_hash, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

/// Binds: username, email
pub const FIND_USER_ID: &str = "SELECT id FROM users WHERE username = ? AND email = ?";

/// Binds: id
pub const DELETE_USER: &str = "DELETE FROM users WHERE id = ?";

// ---------------------------------------------------------------------------
// FOLLOWS edges (src = follower, dst = followee)
// ---------------------------------------------------------------------------

/// Binds: edge id, follower id, followee id, created_at
pub const CREATE_FOLLOWING: &str = r#"
    INSERT OR IGNORE INTO edges (id, kind, src, dst, created_at)
    VALUES (?, 'FOLLOWS', ?, ?, ?)
"#;

/// Binds: follower id, followee id
pub const DELETE_FOLLOWING: &str = "DELETE FROM edges WHERE kind = 'FOLLOWS' AND src = ? AND dst = ?";

/// Binds: followee id
pub const GET_FOLLOWERS: &str = r#"
    SELECT u.id, u.name, u.username, u.email, u.password_hash, u.created_at
    FROM edges e
    JOIN users u ON u.id = e.src
    WHERE e.kind = 'FOLLOWS' AND e.dst = ?
    ORDER BY e.created_at, u.username
"#;

/// Binds: follower id
pub const GET_FOLLOWING: &str = r#"
    SELECT u.id, u.name, u.username, u.email, u.password_hash, u.created_at
    FROM edges e
    JOIN users u ON u.id = e.dst
    WHERE e.kind = 'FOLLOWS' AND e.src = ?
    ORDER BY e.created_at, u.username
"#;

/// Removes every edge touching a node. Binds: node id, node id
pub const DETACH_EDGES: &str = "DELETE FROM edges WHERE src = ? OR dst = ?";

// ---------------------------------------------------------------------------
// Listing nodes, SELLING and BOUGHT edges
// ---------------------------------------------------------------------------

/// Binds: id, price_amount, price_currency, track_name, track_path, created_at
pub const INSERT_LISTING: &str = r#"
    INSERT INTO listings (id, price_amount, price_currency, track_name, track_path, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

/// Binds: id
pub const LISTING_EXISTS: &str = "SELECT 1 FROM listings WHERE id = ?";

/// Binds: edge id, seller id, listing id, created_at
pub const CREATE_SELLING: &str = r#"
    INSERT INTO edges (id, kind, src, dst, created_at)
    VALUES (?, 'SELLING', ?, ?, ?)
"#;

/// Binds: edge id, buyer id, listing id, date, created_at
pub const CREATE_BOUGHT: &str = r#"
    INSERT INTO edges (id, kind, src, dst, date, created_at)
    VALUES (?, 'BOUGHT', ?, ?, ?, ?)
"#;

/// Prefixes a listing read with the node columns plus its optional sale.
macro_rules! listing_query {
    ($tail:literal) => {
        concat!(
            r#"
    SELECT l.id, l.price_amount, l.price_currency, l.track_name, l.track_path, l.created_at,
           b.id AS sale_id, b.date AS sale_date,
           u.id AS buyer_id, u.name AS buyer_name, u.username AS buyer_username,
           u.email AS buyer_email, u.created_at AS buyer_created_at
"#,
            $tail
        )
    };
}

/// Sale of a listing, if any. Binds: listing id
pub const IS_SOLD: &str = r#"
    SELECT b.id AS sale_id, b.date AS sale_date,
           u.id AS buyer_id, u.name AS buyer_name, u.username AS buyer_username,
           u.email AS buyer_email, u.created_at AS buyer_created_at
    FROM edges b
    LEFT JOIN users u ON u.id = b.src
    WHERE b.kind = 'BOUGHT' AND b.dst = ?
"#;

/// Binds: listing id
pub const GET_LISTING: &str = listing_query!(
    r#"
    FROM listings l
    LEFT JOIN edges b ON b.kind = 'BOUGHT' AND b.dst = l.id
    LEFT JOIN users u ON u.id = b.src
    WHERE l.id = ?
"#
);

/// Binds: seller id
pub const LISTINGS_FOR_SELLER: &str = listing_query!(
    r#"
    FROM edges s
    JOIN listings l ON l.id = s.dst
    LEFT JOIN edges b ON b.kind = 'BOUGHT' AND b.dst = l.id
    LEFT JOIN users u ON u.id = b.src
    WHERE s.kind = 'SELLING' AND s.src = ?
    ORDER BY l.created_at DESC, l.id
"#
);

/// Binds: listing id
pub const GET_SELLER: &str = r#"
    SELECT u.id, u.name, u.username, u.email, u.password_hash, u.created_at
    FROM edges s
    JOIN users u ON u.id = s.src
    WHERE s.kind = 'SELLING' AND s.dst = ?
"#;
