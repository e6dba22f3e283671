// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

pub mod auth {
    pub const SETTINGS: &'static str = "https://api.x.com/1.1/account/settings.json";
}

pub mod api {
    pub const API_BASE: &'static str = "https://x.com";
    /// Hosts ending in this suffix serve media files and are exempt from rate limiting.
    pub const CDN_SUFFIX: &'static str = "twimg.com";
}

/// GraphQL operations, as `(query id, operation name)` pairs.
pub mod graphql {
    pub const USER_BY_REST_ID: (&'static str, &'static str) =
        ("tD8zKvQzwY3kdx5yz6YmOw", "UserByRestId");
    pub const USER_BY_SCREEN_NAME: (&'static str, &'static str) =
        ("xmU6X_CKVnQ5lSrCbAmJsg", "UserByScreenName");
    pub const USER_MEDIA: (&'static str, &'static str) =
        ("MOLbHrtk8Ovu7DUNOLcXiA", "UserMedia");
    pub const LIST_BY_REST_ID: (&'static str, &'static str) =
        ("ZMQOSpxDo0cP5Cdt8MgEVA", "ListByRestId");
    pub const LIST_MEMBERS: (&'static str, &'static str) =
        ("3dQPyRyAj6Lslp4e0ClXzg", "ListMembers");
    pub const FOLLOWING: (&'static str, &'static str) =
        ("7FEKOPNAvxWASt6v9gfCXw", "Following");
}

/// JSON pointers to the `instructions` array of each timeline envelope.
pub mod instructions {
    pub const USER_MEDIA: &'static str = "/data/user/result/timeline_v2/timeline/instructions";
    pub const LIST_MEMBERS: &'static str = "/data/list/members_timeline/timeline/instructions";
    pub const FOLLOWING: &'static str = "/data/user/result/timeline/timeline/instructions";
}

/// Feature switches sent with every GraphQL query.
pub const FEATURES: &'static str = concat!(
    r#"{"creator_subscriptions_tweet_preview_api_enabled":true,"#,
    r#""freedom_of_speech_not_reach_fetch_enabled":true,"#,
    r#""graphql_is_translatable_rweb_tweet_is_translatable_enabled":true,"#,
    r#""hidden_profile_likes_enabled":true,"#,
    r#""hidden_profile_subscriptions_enabled":true,"#,
    r#""highlights_tweets_tab_ui_enabled":true,"#,
    r#""longform_notetweets_consumption_enabled":true,"#,
    r#""longform_notetweets_inline_media_enabled":true,"#,
    r#""longform_notetweets_rich_text_read_enabled":true,"#,
    r#""responsive_web_edit_tweet_api_enabled":true,"#,
    r#""responsive_web_enhance_cards_enabled":false,"#,
    r#""responsive_web_graphql_exclude_directive_enabled":true,"#,
    r#""responsive_web_graphql_skip_user_profile_image_extensions_enabled":false,"#,
    r#""responsive_web_graphql_timeline_navigation_enabled":true,"#,
    r#""responsive_web_media_download_video_enabled":false,"#,
    r#""responsive_web_twitter_article_tweet_consumption_enabled":true,"#,
    r#""rweb_tipjar_consumption_enabled":true,"#,
    r#""standardized_nudges_misinfo":true,"#,
    r#""subscriptions_verification_info_is_identity_verified_enabled":true,"#,
    r#""subscriptions_verification_info_verified_since_enabled":true,"#,
    r#""tweet_awards_web_tipping_enabled":false,"#,
    r#""tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled":true,"#,
    r#""tweetypie_unmention_optimization_enabled":true,"#,
    r#""verified_phone_label_enabled":false,"#,
    r#""view_counts_everywhere_api_enabled":true}"#
);
