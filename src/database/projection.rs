//! Shapes returned to clients, assembled from stored rows relative to the
//! caller. Nothing here touches storage.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::media::image_url;

use super::schema::{Id, Recipe, RecipePart, Tag, User};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn from_user(user: &User, viewer: &Viewer) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed: viewer.is_subscribed(user.id),
        }
    }
}

/// Returned by registration; a new account has no subscription state yet.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CreatedUserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for CreatedUserView {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmountView {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for IngredientAmountView {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeView {
    pub id: Id,
    pub author: UserView,
    pub name: String,
    pub text: String,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<IngredientAmountView>,
    pub cooking_time: i32,
    pub is_favorited: u8,
    pub is_in_shopping_cart: u8,
    pub image: String,
}

impl RecipeView {
    pub fn assemble(
        recipe: Recipe,
        author: &User,
        tags: Vec<Tag>,
        parts: Vec<RecipePart>,
        viewer: &Viewer,
        media_url: &str,
    ) -> Self {
        Self {
            id: recipe.id,
            author: UserView::from_user(author, viewer),
            is_favorited: viewer.is_favorited(recipe.id),
            is_in_shopping_cart: viewer.is_in_shopping_cart(recipe.id),
            image: image_url(media_url, &recipe.image),
            name: recipe.name,
            text: recipe.text,
            tags,
            ingredients: parts.into_iter().map(IngredientAmountView::from).collect(),
            cooking_time: recipe.cooking_time,
        }
    }
}

/// Reduced recipe shape used by favorites, the cart and subscriptions.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ShortRecipeView {
    pub id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl ShortRecipeView {
    pub fn without_image(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: None,
            cooking_time: recipe.cooking_time,
        }
    }

    pub fn with_image(recipe: &Recipe, media_url: &str) -> Self {
        Self {
            image: Some(image_url(media_url, &recipe.image)),
            ..Self::without_image(recipe)
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<ShortRecipeView>,
    pub recipes_count: i64,
}

/// What the caller has favorited, carted and subscribed to, restricted to the
/// records being projected. Anonymous callers have none of it.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    authenticated: bool,
    favorites: HashSet<Id>,
    cart: HashSet<Id>,
    subscriptions: HashSet<Id>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(
        favorites: HashSet<Id>,
        cart: HashSet<Id>,
        subscriptions: HashSet<Id>,
    ) -> Self {
        Self {
            authenticated: true,
            favorites,
            cart,
            subscriptions,
        }
    }

    pub fn is_favorited(&self, recipe_id: Id) -> u8 {
        (self.authenticated && self.favorites.contains(&recipe_id)) as u8
    }

    pub fn is_in_shopping_cart(&self, recipe_id: Id) -> u8 {
        (self.authenticated && self.cart.contains(&recipe_id)) as u8
    }

    pub fn is_subscribed(&self, author_id: Id) -> bool {
        self.authenticated && self.subscriptions.contains(&author_id)
    }
}

/// Groups rows under the id `key` picks out, keeping row order.
pub fn group_by_id<T>(rows: Vec<T>, key: impl Fn(&T) -> Id) -> HashMap<Id, Vec<T>> {
    let mut map: HashMap<Id, Vec<T>> = HashMap::new();
    rows.into_iter()
        .for_each(|row| map.entry(key(&row)).or_default().push(row));
    map
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::schema::UserRole;

    fn author() -> User {
        User {
            id: 3,
            email: "chef@example.com".to_string(),
            username: "chef".to_string(),
            first_name: "Julia".to_string(),
            last_name: "Child".to_string(),
            password: "hash".to_string(),
            role: UserRole::User,
            date_joined: Utc::now(),
        }
    }

    fn recipe(id: Id) -> Recipe {
        Recipe {
            id,
            author_id: 3,
            name: "Pancakes".to_string(),
            image: "recipes/p.png".to_string(),
            text: "Mix and fry.".to_string(),
            cooking_time: 20,
            pub_date: Utc::now(),
        }
    }

    fn flour(recipe_id: Id) -> RecipePart {
        RecipePart {
            recipe_id,
            ingredient_id: 10,
            name: "flour".to_string(),
            measurement_unit: "g".to_string(),
            amount: 200,
        }
    }

    #[test]
    fn anonymous_viewer_sees_no_flags() {
        let view = RecipeView::assemble(recipe(1), &author(), vec![], vec![], &Viewer::anonymous(), "/media/");

        assert_eq!(view.is_favorited, 0);
        assert_eq!(view.is_in_shopping_cart, 0);
        assert!(!view.author.is_subscribed);
    }

    #[test]
    fn flags_reflect_rows_for_this_recipe_only() {
        let viewer = Viewer::authenticated(
            HashSet::from([1]),
            HashSet::from([2]),
            HashSet::from([3]),
        );

        let first = RecipeView::assemble(recipe(1), &author(), vec![], vec![], &viewer, "/media/");
        let second = RecipeView::assemble(recipe(2), &author(), vec![], vec![], &viewer, "/media/");

        assert_eq!((first.is_favorited, first.is_in_shopping_cart), (1, 0));
        assert_eq!((second.is_favorited, second.is_in_shopping_cart), (0, 1));
        assert!(first.author.is_subscribed);
    }

    #[test]
    fn recipe_view_serializes_read_shape() {
        let tag = Tag {
            id: 1,
            name: "Breakfast".to_string(),
            color: "#E26C2D".to_string(),
            slug: "breakfast".to_string(),
        };
        let view = RecipeView::assemble(
            recipe(5),
            &author(),
            vec![tag],
            vec![flour(5)],
            &Viewer::anonymous(),
            "/media/",
        );

        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({
                "id": 5,
                "author": {
                    "email": "chef@example.com",
                    "id": 3,
                    "username": "chef",
                    "first_name": "Julia",
                    "last_name": "Child",
                    "is_subscribed": false
                },
                "name": "Pancakes",
                "text": "Mix and fry.",
                "tags": [{ "id": 1, "name": "Breakfast", "color": "#E26C2D", "slug": "breakfast" }],
                "ingredients": [{ "id": 10, "name": "flour", "measurement_unit": "g", "amount": 200 }],
                "cooking_time": 20,
                "is_favorited": 0,
                "is_in_shopping_cart": 0,
                "image": "/media/recipes/p.png"
            })
        );
    }

    #[test]
    fn short_view_omits_image_unless_requested() {
        let short = serde_json::to_value(ShortRecipeView::without_image(&recipe(1))).unwrap();
        let full = serde_json::to_value(ShortRecipeView::with_image(&recipe(1), "/media/")).unwrap();

        assert_eq!(short, json!({ "id": 1, "name": "Pancakes", "cooking_time": 20 }));
        assert_eq!(full["image"], "/media/recipes/p.png");
    }

    #[test]
    fn rows_group_under_their_key() {
        let grouped = group_by_id(vec![flour(1), flour(2), flour(1)], |p| p.recipe_id);

        assert_eq!(grouped[&1].len(), 2);
        assert_eq!(grouped[&2].len(), 1);
    }
}
