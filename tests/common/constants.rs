//! Shared constants for end-to-end tests
//!
//! When seeded data changes (user credentials, catalog names, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user name
pub const TEST_USER: &str = "testuser";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

/// Admin test user name
pub const ADMIN_USER: &str = "admin";

/// Admin test user password
pub const ADMIN_PASS: &str = "adminpass123";

/// Secret the test server signs session tokens with
pub const TEST_JWT_SECRET: &str = "end-to-end-test-secret";

// ============================================================================
// Seeded Catalog
// ============================================================================

pub const ARTIST_1_NAME: &str = "The Test Band";
pub const ARTIST_2_NAME: &str = "Jazz Ensemble";

pub const SONG_1_NAME: &str = "Opening Track";
pub const SONG_2_NAME: &str = "Middle Track";
pub const SONG_3_NAME: &str = "Smooth Jazz";

pub const ALBUM_1_TITLE: &str = "First Album";

/// Well formed id that no entity will ever have
pub const MISSING_ID: &str = "000000000000000000000000";

// ============================================================================
// Uploads
// ============================================================================

/// Smallest complete PNG: signature, IHDR, IDAT and IEND chunks.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15,
    0xC4, 0x89, //
    0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, // IDAT
    0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, //
    0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82, // IEND
];

/// An ID3v2 tag header followed by a few padding bytes.
pub const MP3_BYTES: &[u8] = &[
    0x49, 0x44, 0x33, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00,
];

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Poll interval when waiting for server (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Default timeout for HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
