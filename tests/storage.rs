use std::{collections::HashMap, path::PathBuf};

use chrono::Duration;
use sqlx::PgPool;

use foodgram::{
    actions::{
        ingredients::{self, NewIngredient},
        interactions::InteractionKind,
        recipes::{self, IngredientAmount, RecipePatch, RecipeWrite},
        subscriptions,
        tags::{self, NewTag},
        users::{self, NewUser},
    },
    jwt::{generate_jwt_session, verify_jwt_session, SessionData},
    schema::{Id, UserRole},
};

const SECRET: &str = "storage-secret";
const MEDIA_URL: &str = "/media/";
const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

fn media_root() -> PathBuf {
    std::env::temp_dir().join(format!("foodgram-test-{}", uuid::Uuid::new_v4()))
}

async fn sign_up(name: &str, pool: &PgPool) -> SessionData {
    let user = NewUser {
        email: format!("{name}@example.com"),
        username: name.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        password: "correct horse".to_string(),
    };
    let created = users::create_user(&user, UserRole::User, pool).await.unwrap();
    let token = generate_jwt_session(&created, SECRET, Duration::hours(1)).unwrap();

    verify_jwt_session(&token, SECRET).unwrap().into()
}

/// Loads a small catalog and returns ingredient ids by name plus the tag ids.
async fn stock(pool: &PgPool) -> (HashMap<String, Id>, Vec<Id>) {
    let list: Vec<NewIngredient> = [
        ("Flour", "g"),
        ("Eggs", "pcs"),
        ("Milk", "ml"),
        ("Tomato", "g"),
        ("Potato", "g"),
    ]
    .iter()
    .map(|(name, unit)| NewIngredient {
        name: name.to_string(),
        measurement_unit: unit.to_string(),
    })
    .collect();
    ingredients::load_ingredients(&list, pool, None).await.unwrap();

    let tag_list = vec![
        NewTag {
            name: "Breakfast".to_string(),
            color: "#E26C2D".to_string(),
            slug: "breakfast".to_string(),
        },
        NewTag {
            name: "Dinner".to_string(),
            color: "#49B64E".to_string(),
            slug: "dinner".to_string(),
        },
    ];
    tags::load_tags(&tag_list, pool, None).await.unwrap();

    let ingredient_ids: Vec<(Id, String)> = sqlx::query_as("SELECT id, name FROM ingredients")
        .fetch_all(pool)
        .await
        .unwrap();
    let tag_ids: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap();

    (
        ingredient_ids.into_iter().map(|(id, name)| (name, id)).collect(),
        tag_ids.into_iter().map(|(id,)| id).collect(),
    )
}

fn pancakes(ingredient: &HashMap<String, Id>, tags: &[Id]) -> RecipeWrite {
    RecipeWrite {
        ingredients: vec![
            IngredientAmount {
                id: ingredient["Flour"],
                amount: 200,
            },
            IngredientAmount {
                id: ingredient["Eggs"],
                amount: 2,
            },
            IngredientAmount {
                id: ingredient["Milk"],
                amount: 300,
            },
        ],
        tags: tags.to_vec(),
        image: IMAGE.to_string(),
        name: "Pancakes".to_string(),
        text: "Mix and fry.".to_string(),
        cooking_time: 20,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn update_replaces_the_whole_ingredient_set(pool: PgPool) {
    let root = media_root();
    let (ingredient, tags) = stock(&pool).await;
    let cook = sign_up("cook", &pool).await;

    let id = recipes::create_recipe(&cook, &pancakes(&ingredient, &tags), &root, &pool)
        .await
        .unwrap();

    let patch = RecipePatch {
        ingredients: Some(vec![IngredientAmount {
            id: ingredient["Flour"],
            amount: 150,
        }]),
        ..RecipePatch::default()
    };
    recipes::update_recipe(id, &cook, &patch, &root, &pool)
        .await
        .unwrap();

    let parts = ingredients::list_recipe_parts(&[id], &pool).await.unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "Flour");
    assert_eq!(parts[0].amount, 150);

    let kept_tags = tags::list_recipe_tags(&[id], &pool).await.unwrap();
    assert_eq!(kept_tags.len(), tags.len());

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn only_the_author_may_update(pool: PgPool) {
    let root = media_root();
    let (ingredient, tags) = stock(&pool).await;
    let cook = sign_up("cook", &pool).await;
    let guest = sign_up("guest", &pool).await;

    let id = recipes::create_recipe(&cook, &pancakes(&ingredient, &tags), &root, &pool)
        .await
        .unwrap();
    let patch = RecipePatch {
        cooking_time: Some(5),
        ..RecipePatch::default()
    };

    let error = recipes::update_recipe(id, &guest, &patch, &root, &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 403);

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_ingredient_is_named_in_the_error(pool: PgPool) {
    let root = media_root();
    let (ingredient, tags) = stock(&pool).await;
    let cook = sign_up("cook", &pool).await;

    let mut recipe = pancakes(&ingredient, &tags);
    recipe.ingredients.push(IngredientAmount { id: 9999, amount: 1 });

    let error = recipes::create_recipe(&cook, &recipe, &root, &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 400);
    assert_eq!(error.field.as_deref(), Some("ingredients"));
    assert!(error.info.unwrap().contains("9999"));

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn repeated_favorite_and_cart_adds_are_rejected(pool: PgPool) {
    let root = media_root();
    let (ingredient, tags) = stock(&pool).await;
    let cook = sign_up("cook", &pool).await;
    let guest = sign_up("guest", &pool).await;

    let id = recipes::create_recipe(&cook, &pancakes(&ingredient, &tags), &root, &pool)
        .await
        .unwrap();

    for kind in [InteractionKind::Favorite, InteractionKind::ShoppingCart] {
        let short = kind.add(&guest, id, &pool).await.unwrap();
        assert_eq!(short.id, id);

        let error = kind.add(&guest, id, &pool).await.unwrap_err();
        assert_eq!(error.code, 400);

        kind.remove(&guest, id, &pool).await.unwrap();
        let error = kind.remove(&guest, id, &pool).await.unwrap_err();
        assert_eq!(error.code, 404);
    }

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn flags_follow_stored_rows(pool: PgPool) {
    let root = media_root();
    let (ingredient, tags) = stock(&pool).await;
    let cook = sign_up("cook", &pool).await;
    let guest = sign_up("guest", &pool).await;

    let favorite = recipes::create_recipe(&cook, &pancakes(&ingredient, &tags), &root, &pool)
        .await
        .unwrap();
    let carted = recipes::create_recipe(&cook, &pancakes(&ingredient, &tags), &root, &pool)
        .await
        .unwrap();

    InteractionKind::Favorite.add(&guest, favorite, &pool).await.unwrap();
    InteractionKind::ShoppingCart.add(&guest, carted, &pool).await.unwrap();

    let mut list = Vec::new();
    for id in [favorite, carted] {
        list.push(recipes::get_recipe(id, &pool).await.unwrap().unwrap());
    }

    let views = recipes::load_recipe_views(list.clone(), Some(&guest), MEDIA_URL, &pool)
        .await
        .unwrap();
    let flags: HashMap<Id, (u8, u8)> = views
        .iter()
        .map(|view| (view.id, (view.is_favorited, view.is_in_shopping_cart)))
        .collect();
    assert_eq!(flags[&favorite], (1, 0));
    assert_eq!(flags[&carted], (0, 1));

    let anonymous = recipes::load_recipe_views(list, None, MEDIA_URL, &pool)
        .await
        .unwrap();
    assert!(anonymous
        .iter()
        .all(|view| view.is_favorited == 0 && view.is_in_shopping_cart == 0));

    let _ = tokio::fs::remove_dir_all(&root).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn subscriptions_reject_self_and_duplicates(pool: PgPool) {
    let cook = sign_up("cook", &pool).await;
    let guest = sign_up("guest", &pool).await;

    let error = subscriptions::subscribe(&guest, guest.user_id, None, MEDIA_URL, &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 400);

    let view = subscriptions::subscribe(&guest, cook.user_id, None, MEDIA_URL, &pool)
        .await
        .unwrap();
    assert!(view.author.is_subscribed);

    let error = subscriptions::subscribe(&guest, cook.user_id, None, MEDIA_URL, &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 400);

    subscriptions::unsubscribe(&guest, cook.user_id, &pool)
        .await
        .unwrap();
    let error = subscriptions::unsubscribe(&guest, cook.user_id, &pool)
        .await
        .unwrap_err();
    assert_eq!(error.code, 404);
}

#[sqlx::test(migrations = "./migrations")]
async fn ingredient_search_matches_prefix_ignoring_case(pool: PgPool) {
    stock(&pool).await;

    for prefix in ["to", "TO", "Tom"] {
        let found = ingredients::search_ingredients(Some(prefix), &pool, None)
            .await
            .unwrap();
        let names: Vec<&str> = found.iter().map(|i| i.name.as_str()).collect();

        assert_eq!(names, vec!["Tomato"], "{prefix}");
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_an_account_takes_its_recipes_along(pool: PgPool) {
    let root = media_root();
    let (ingredient, tags) = stock(&pool).await;
    let cook = sign_up("cook", &pool).await;
    let guest = sign_up("guest", &pool).await;

    let id = recipes::create_recipe(&cook, &pancakes(&ingredient, &tags), &root, &pool)
        .await
        .unwrap();
    InteractionKind::Favorite.add(&guest, id, &pool).await.unwrap();
    let image = recipes::get_recipe(id, &pool).await.unwrap().unwrap().image;
    assert!(root.join(&image).exists());

    users::delete_user(&cook, &root, &pool).await.unwrap();

    assert!(users::get_user_by_id(cook.user_id, &pool).await.unwrap().is_none());
    assert!(recipes::get_recipe(id, &pool).await.unwrap().is_none());
    assert!(!root.join(&image).exists());

    let error = users::delete_user(&cook, &root, &pool).await.unwrap_err();
    assert_eq!(error.code, 401);

    let _ = tokio::fs::remove_dir_all(&root).await;
}
