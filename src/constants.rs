/// Application constants

// Contract entry points (read-only)
pub const FN_GET_BOARD_STATE: &str = "get-board-state";
pub const FN_GET_GAME_STATUS: &str = "get-game-status";
pub const FN_GET_CURRENT_TURN: &str = "get-current-turn";
pub const FN_IS_VALID_MOVE: &str = "is-valid-move";

// Contract entry points (public, signed)
pub const FN_MAKE_MOVE: &str = "make-move";
pub const FN_START_NEW_GAME: &str = "start-new-game";

// Defaults for the testnet deployment
pub const DEFAULT_STACKS_API_URL: &str = "https://api.testnet.hiro.so";
pub const DEFAULT_CONTRACT_ADDRESS: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
pub const DEFAULT_CONTRACT_NAME: &str = "tictactoe";

// Board geometry
pub const BOARD_CELLS: usize = 9;
pub const BOARD_WIDTH: usize = 3;

// HTTP clients
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 4;
pub const LEDGER_REQUEST_TIMEOUT_SECS: u64 = 10;
// The bridge holds the request open until the user approves or declines.
pub const SIGNER_REQUEST_TIMEOUT_SECS: u64 = 120;

// Sync engine
pub const SYNC_INTERVAL_SECS: u64 = 5;

// Transaction lifecycle
pub const TX_POLL_INTERVAL_SECS: u64 = 2;
pub const TX_POLL_MAX_ATTEMPTS: u32 = 15;
pub const TX_MOVE_TIMEOUT_SECS: u64 = 12;
pub const TX_RESET_TIMEOUT_SECS: u64 = 3;
pub const TX_STATUS_CLEAR_MS: u64 = 2_000;

// Stats aggregation
pub const STATS_CACHE_KEY: &str = "clarityxo_stats";
pub const STATS_CACHE_VERSION: u32 = 1;
pub const STATS_CACHE_TTL_SECS: u64 = 300; // 5 minutes
pub const STATS_BATCH_SIZE: usize = 50;
pub const STATS_MAX_TRANSACTIONS: usize = 200;
pub const WIN_RATE_MIN_GAMES: u32 = 3;

// Transient status messages
pub const MSG_SIGN_MOVE: &str = "Please sign the transaction in your wallet...";
pub const MSG_SIGN_RESET: &str = "Starting new game...";
pub const MSG_SUBMITTED: &str = "Transaction submitted! Waiting for confirmation...";
pub const MSG_MOVE_CONFIRMED: &str = "Move confirmed";
pub const MSG_RESET_CONFIRMED: &str = "New game started!";
pub const MSG_CANCELLED: &str = "Transaction cancelled";
pub const MSG_MOVE_FAILED: &str = "Transaction failed";
pub const MSG_RESET_FAILED: &str = "Failed to start new game";
pub const MSG_CELL_OCCUPIED: &str = "Cell already occupied!";

// API version
pub const API_VERSION: &str = "v1";
