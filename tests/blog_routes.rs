mod common;

use axum::http::StatusCode;
use blogicum::app::PostId;
use blogicum::app::query::PostQuery;
use blogicum::app::store::BlogStore as _;
use chrono::{Duration, Utc};
use common::{TestApp, png_bytes, post_fields};

#[tokio::test]
async fn anonymous_edit_redirects_to_login() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let post = app.post(&alice, "Hello", None).await;

    let response = app.client().get(&format!("/posts/{post}/edit/")).await;
    response.assert_redirect(&format!("/auth/login/?next=%2Fposts%2F{post}%2Fedit%2F"));

    let response = app.client().get("/posts/create/").await;
    response.assert_redirect("/auth/login/?next=%2Fposts%2Fcreate%2F");
}

#[tokio::test]
async fn edit_of_missing_post_is_404_even_for_anonymous() {
    let app = TestApp::new();
    let response = app.client().get("/posts/41/edit/").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_posts_go_to_login_before_lookup() {
    let app = TestApp::new();
    let mut client = app.client();
    client
        .post_form("/posts/41/delete/", &[])
        .await
        .assert_redirect("/auth/login/?next=%2Fposts%2F41%2Fdelete%2F");
    client
        .post_form("/posts/41/comment/", &[("text", "First!")])
        .await
        .assert_redirect("/auth/login/?next=%2Fposts%2F41%2Fcomment%2F");

    app.user("alice").await;
    client.login("alice").await;
    assert_eq!(
        client.post_form("/posts/41/delete/", &[]).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn non_author_edit_is_redirected_without_changes() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    app.user("bob").await;
    let category = app.category("travel", true).await;
    let post = app.post(&alice, "Original", Some(category.id)).await;

    let mut bob = app.client();
    bob.login("bob").await;
    let category_id = category.id.to_string();
    bob.get(&format!("/posts/{post}/edit/"))
        .await
        .assert_redirect(&format!("/posts/{post}/"));
    bob.post_multipart(
        &format!("/posts/{post}/edit/"),
        &post_fields("Hijacked", &category_id),
        None,
    )
    .await
    .assert_redirect(&format!("/posts/{post}/"));

    let stored = app.store.post_by_id(post).await.unwrap().unwrap();
    assert_eq!(stored.title, "Original");
    assert_eq!(stored.text, "Text of Original");
}

#[tokio::test]
async fn author_edits_post() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let category = app.category("travel", true).await;
    let location = app.location("Lisbon").await;
    let post = app.post(&alice, "Draft title", Some(category.id)).await;

    let mut client = app.client();
    client.login("alice").await;
    let page = client.get(&format!("/posts/{post}/edit/")).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Draft title"));

    let category_id = category.id.to_string();
    let location_id = location.id.to_string();
    let mut fields = post_fields("Final title", &category_id);
    fields.retain(|(name, _)| *name != "location" && *name != "is_published");
    fields.push(("location", &location_id));
    client
        .post_multipart(&format!("/posts/{post}/edit/"), &fields, None)
        .await
        .assert_redirect(&format!("/posts/{post}/"));

    let stored = app.store.post_by_id(post).await.unwrap().unwrap();
    assert_eq!(stored.title, "Final title");
    assert_eq!(stored.location.unwrap().id, location.id);
    assert!(!stored.is_published);
}

#[tokio::test]
async fn invalid_post_form_is_shown_again() {
    let app = TestApp::new();
    app.user("alice").await;
    app.category("travel", true).await;

    let mut client = app.client();
    client.login("alice").await;
    let response = client
        .post_multipart("/posts/create/", &post_fields("No category", ""), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("This field is required."));
    assert!(response.body.contains("No category"));
    assert_eq!(app.store.count_posts(&PostQuery::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn create_post_with_image() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let category = app.category("travel", true).await;

    let mut client = app.client();
    client.login("alice").await;
    let category_id = category.id.to_string();
    let png = png_bytes();
    client
        .post_multipart(
            "/posts/create/",
            &post_fields("With a picture", &category_id),
            Some(("sunset.png", png.as_slice())),
        )
        .await
        .assert_redirect("/profile/alice/");

    let posts = app
        .store
        .list_posts(&PostQuery::all().by_author(alice.id), 0, 10)
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    let image = posts[0].image.clone().unwrap();
    assert!(image.starts_with("posts/") && image.ends_with(".png"));
    assert!(app.dir.path().join("media").join(&image).exists());

    let served = client.get(&format!("/media/{image}")).await;
    assert_eq!(served.status, StatusCode::OK);
    assert!(served.body.starts_with("\u{FFFD}PNG"));
}

#[tokio::test]
async fn upload_that_is_not_an_image_is_rejected() {
    let app = TestApp::new();
    app.user("alice").await;
    let category = app.category("travel", true).await;

    let mut client = app.client();
    client.login("alice").await;
    let category_id = category.id.to_string();
    let response = client
        .post_multipart(
            "/posts/create/",
            &post_fields("Fake picture", &category_id),
            Some(("sunset.png", b"not really a png")),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Upload a valid image."));
    assert_eq!(app.store.count_posts(&PostQuery::all()).await.unwrap(), 0);
    assert!(!app.dir.path().join("media").join("posts").exists());
}

#[tokio::test]
async fn delete_post_is_a_no_op_for_others() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    app.user("bob").await;
    let post = app.post(&alice, "Keep me", None).await;

    let mut bob = app.client();
    bob.login("bob").await;
    bob.post_form(&format!("/posts/{post}/delete/"), &[])
        .await
        .assert_redirect("/profile/bob/");
    assert!(app.store.post_by_id(post).await.unwrap().is_some());

    let mut client = app.client();
    client.login("alice").await;
    client
        .post_form(&format!("/posts/{post}/delete/"), &[])
        .await
        .assert_redirect("/profile/alice/");
    assert!(app.store.post_by_id(post).await.unwrap().is_none());
}

#[tokio::test]
async fn comments_belong_to_their_author() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    app.user("bob").await;
    let post = app.post(&alice, "Discuss", None).await;

    let mut bob = app.client();
    bob.login("bob").await;
    bob.post_form(&format!("/posts/{post}/comment/"), &[("text", "First!")])
        .await
        .assert_redirect(&format!("/posts/{post}/"));
    let comments = app.store.comments_for_post(post).await.unwrap();
    assert_eq!(comments.len(), 1);
    let comment = comments[0].id;

    let detail = bob.get(&format!("/posts/{post}/")).await;
    assert!(detail.body.contains("First!"));
    assert!(detail.body.contains(&format!("/posts/{post}/edit_comment/{comment}/")));

    let mut alice_client = app.client();
    alice_client.login("alice").await;
    let edit_url = format!("/posts/{post}/edit_comment/{comment}/");
    let delete_url = format!("/posts/{post}/delete_comment/{comment}/");
    assert_eq!(alice_client.get(&edit_url).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        alice_client
            .post_form(&edit_url, &[("text", "Rewritten")])
            .await
            .status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        alice_client.post_form(&delete_url, &[]).await.status,
        StatusCode::NOT_FOUND
    );

    // Right comment id under the wrong post.
    let other_post = app.post(&alice, "Elsewhere", None).await;
    let wrong_post = format!("/posts/{other_post}/edit_comment/{comment}/");
    assert_eq!(bob.get(&wrong_post).await.status, StatusCode::NOT_FOUND);

    bob.post_form(&edit_url, &[("text", "Edited")])
        .await
        .assert_redirect(&format!("/posts/{post}/"));
    assert_eq!(
        app.store.comments_for_post(post).await.unwrap()[0].text,
        "Edited"
    );

    let confirm = bob.get(&delete_url).await;
    assert_eq!(confirm.status, StatusCode::OK);
    assert!(confirm.body.contains("Are you sure"));
    assert!(confirm.body.contains(&format!("action=\"{delete_url}\"")));
    assert_eq!(app.store.comments_for_post(post).await.unwrap().len(), 1);
    bob.post_form(&delete_url, &[])
        .await
        .assert_redirect(&format!("/posts/{post}/"));
    assert!(app.store.comments_for_post(post).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_comment_is_rejected() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let post = app.post(&alice, "Discuss", None).await;

    let mut client = app.client();
    client.login("alice").await;
    let response = client
        .post_form(&format!("/posts/{post}/comment/"), &[("text", "  ")])
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Enter your comment..."));
    assert!(app.store.comments_for_post(post).await.unwrap().is_empty());
}

#[tokio::test]
async fn listings_only_show_visible_posts() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let open = app.category("open", true).await;
    let hidden = app.category("hidden", false).await;
    app.post(&alice, "Visible post", Some(open.id)).await;
    app.post(&alice, "Uncategorized post", None).await;
    let draft = app
        .post_with(&alice, "Draft post", Some(open.id), false, Utc::now() - Duration::hours(1))
        .await;
    app.post_with(&alice, "Scheduled post", Some(open.id), true, Utc::now() + Duration::days(1))
        .await;
    app.post(&alice, "Hidden category post", Some(hidden.id)).await;

    let mut anonymous = app.client();
    let index = anonymous.get("/").await;
    assert_eq!(index.status, StatusCode::OK);
    assert!(index.body.contains("Visible post"));
    assert!(index.body.contains("Uncategorized post"));
    for hidden_title in ["Draft post", "Scheduled post", "Hidden category post"] {
        assert!(!index.body.contains(hidden_title), "{hidden_title}");
    }

    let category = anonymous.get("/category/open/").await;
    assert!(category.body.contains("Visible post"));
    assert!(!category.body.contains("Uncategorized post"));
    assert!(!category.body.contains("Draft post"));
    assert_eq!(
        anonymous.get("/category/hidden/").await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        anonymous.get("/category/nope/").await.status,
        StatusCode::NOT_FOUND
    );

    let profile = anonymous.get("/profile/alice/").await;
    assert!(profile.body.contains("Visible post"));
    assert!(!profile.body.contains("Draft post"));

    assert_eq!(
        anonymous.get(&format!("/posts/{draft}/")).await.status,
        StatusCode::NOT_FOUND
    );

    let mut author = app.client();
    author.login("alice").await;
    let own_profile = author.get("/profile/alice/").await;
    for title in ["Draft post", "Scheduled post", "Hidden category post"] {
        assert!(own_profile.body.contains(title), "{title}");
    }
    assert_eq!(
        author.get(&format!("/posts/{draft}/")).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn listings_are_paginated() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let now = Utc::now();
    for i in 0..25 {
        app.post_with(
            &alice,
            &format!("Post {i:02}"),
            None,
            true,
            now - Duration::hours(i + 1),
        )
        .await;
    }

    let mut client = app.client();
    let first = client.get("/?page=abc").await;
    assert!(first.body.contains("Page 1 of 3"));
    assert!(first.body.contains("Post 00"));
    assert!(first.body.contains("Post 09"));
    assert!(!first.body.contains("Post 10"));

    let last = client.get("/?page=99").await;
    assert!(last.body.contains("Page 3 of 3"));
    assert!(last.body.contains("Post 20"));
    assert!(last.body.contains("Post 24"));
    assert!(!last.body.contains("Post 19"));

    let profile = client.get("/profile/alice/?page=2").await;
    assert!(profile.body.contains("Page 2 of 3"));
    assert!(profile.body.contains("Post 10"));
}

#[tokio::test]
async fn odd_page_parameters_still_render() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let now = Utc::now();
    for i in 0..25 {
        app.post_with(&alice, &format!("Post {i:02}"), None, true, now - Duration::hours(i + 1))
            .await;
    }

    let mut client = app.client();
    let repeated = client.get("/?page=1&page=2").await;
    assert_eq!(repeated.status, StatusCode::OK);
    assert!(repeated.body.contains("Page 2 of 3"));

    let huge = client.get("/profile/alice/?page=99999999999999999999").await;
    assert_eq!(huge.status, StatusCode::OK);
    assert!(huge.body.contains("Page 3 of 3"));

    let garbled = client.get("/?page=%FF&other").await;
    assert_eq!(garbled.status, StatusCode::OK);
    assert!(garbled.body.contains("Page 1 of 3"));
}

#[tokio::test]
async fn post_without_csrf_token_is_forbidden() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let post = app.post(&alice, "Discuss", None).await;

    let mut client = app.client();
    client.login("alice").await;
    let response = client
        .post_form_raw(&format!("/posts/{post}/comment/"), &[("text", "sneaky")])
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body.contains("CSRF"));

    let response = client
        .post_form_raw(
            &format!("/posts/{post}/comment/"),
            &[("text", "sneaky"), ("csrf_token", "forged")],
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(app.store.comments_for_post(post).await.unwrap().is_empty());
}

#[tokio::test]
async fn register_login_logout() {
    let app = TestApp::new();
    let mut client = app.client();

    let mismatch = client
        .post_form(
            "/auth/registration/",
            &[
                ("username", "newbie"),
                ("password1", "long enough"),
                ("password2", "different"),
            ],
        )
        .await;
    assert_eq!(mismatch.status, StatusCode::OK);
    assert!(mismatch.body.contains("didn&#x27;t match") || mismatch.body.contains("didn't match"));

    client
        .post_form(
            "/auth/registration/",
            &[
                ("username", "newbie"),
                ("password1", "long enough"),
                ("password2", "long enough"),
            ],
        )
        .await
        .assert_redirect("/");

    let taken = client
        .post_form(
            "/auth/registration/",
            &[
                ("username", "newbie"),
                ("password1", "long enough"),
                ("password2", "long enough"),
            ],
        )
        .await;
    assert!(taken.body.contains("already exists"));

    let wrong = client
        .post_form(
            "/auth/login/",
            &[("username", "newbie"), ("password", "wrong password")],
        )
        .await;
    assert_eq!(wrong.status, StatusCode::OK);
    assert!(wrong.body.contains("Please enter a correct username and password"));

    client
        .post_form(
            "/auth/login/",
            &[
                ("username", "newbie"),
                ("password", "long enough"),
                ("next", "/pages/rules/"),
            ],
        )
        .await
        .assert_redirect("/pages/rules/");
    let home = client.get("/").await;
    assert!(home.body.contains("/profile/newbie/"));
    assert!(home.body.contains("Log out"));

    let logged_out = client.post_form("/auth/logout/", &[]).await;
    assert_eq!(logged_out.status, StatusCode::OK);
    let home = client.get("/").await;
    assert!(!home.body.contains("/profile/newbie/"));
    assert!(home.body.contains("Log in"));
}

#[tokio::test]
async fn login_ignores_foreign_next() {
    let app = TestApp::new();
    app.user("alice").await;
    let mut client = app.client();
    client
        .post_form(
            "/auth/login/",
            &[
                ("username", "alice"),
                ("password", common::PASSWORD),
                ("next", "https://evil.example/"),
            ],
        )
        .await
        .assert_redirect("/");
}

#[tokio::test]
async fn edit_profile() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    app.user("bob").await;

    let mut client = app.client();
    client.login("alice").await;
    let page = client.get("/edit_profile/").await;
    assert!(page.body.contains("value=\"alice\""));

    let taken = client
        .post_form(
            "/edit_profile/",
            &[("username", "bob"), ("first_name", "Alice")],
        )
        .await;
    assert_eq!(taken.status, StatusCode::OK);
    assert!(taken.body.contains("already exists"));

    client
        .post_form(
            "/edit_profile/",
            &[
                ("username", "alice2"),
                ("first_name", "Alice"),
                ("last_name", "Liddell"),
                ("email", "alice@example.com"),
            ],
        )
        .await
        .assert_redirect("/profile/alice2/");
    let stored = app.store.user_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(stored.username, "alice2");
    assert_eq!(stored.full_name(), "Alice Liddell");
    assert!(client.get("/profile/alice2/").await.body.contains("Alice Liddell"));
    assert_eq!(
        client.get("/profile/alice/").await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn deleting_the_author_removes_their_posts() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app.post(&alice, "Soon gone", None).await;
    app.store
        .create_comment(post, bob.id, "nice")
        .await
        .unwrap();

    assert!(app.store.delete_user(alice.id).await.unwrap());
    assert_eq!(
        app.client().get(&format!("/posts/{post}/")).await.status,
        StatusCode::NOT_FOUND
    );
    assert!(app.store.comments_for_post(post).await.unwrap().is_empty());
}

#[tokio::test]
async fn send_test_email_writes_a_file() {
    let app = TestApp::new();
    let response = app.client().get("/send_test_email/").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.starts_with("Test email sent."));
    let written: Vec<_> = std::fs::read_dir(app.dir.path().join("sent_emails"))
        .unwrap()
        .collect();
    assert_eq!(written.len(), 1);
}

#[tokio::test]
async fn static_and_error_pages() {
    let app = TestApp::new();
    let mut client = app.client();

    let about = client.get("/pages/about/").await;
    assert_eq!(about.status, StatusCode::OK);
    assert!(about.body.contains("About the project"));
    assert_eq!(client.get("/pages/rules/").await.status, StatusCode::OK);

    let missing = client.get("/no/such/page/").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert!(missing.body.contains("Error 404"));

    assert_eq!(
        client.get("/posts/not-a-number/").await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        client.get(&format!("/posts/{}/", PostId(999))).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        client.get("/profile/ghost/").await.status,
        StatusCode::NOT_FOUND
    );
}
