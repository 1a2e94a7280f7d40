pub const MAX_LENGTH_TEXT_FIELD: usize = 200;
pub const MAX_LENGTH_USER_FIELD: usize = 150;
pub const MAX_LENGTH_EMAIL: usize = 254;

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const SHOP_LIST_FILENAME: &str = "shop_list.txt";

pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

pub const SESSION_HEADER_PREFIX: &str = "Token ";

pub const RESERVED_USERNAMES: &[&str] = &["me"];
