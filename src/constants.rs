pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 6;
pub const MAX_COUNT_PER_PAGE: i64 = 100;

pub const RESERVED_USERNAMES: &[&str] = &["me"];

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const NAME_MAX_LENGTH: usize = 150;
pub const RECIPE_NAME_MAX_LENGTH: usize = 150;

/// Upper bound for JSON request bodies; recipe payloads embed the image.
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

pub const RECIPE_IMAGE_DIR: &str = "recipes";
pub const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "png"),
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("gif", "gif"),
    ("webp", "webp"),
];

pub const SHOPPING_LIST_HEADER: &str = "To cook the selected recipes you will need:";
pub const SHOPPING_LIST_EMPTY: &str = "Shopping cart is empty";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
