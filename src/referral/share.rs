//! Referral share message
//!
//! The message is composed here; presenting the OS share sheet (or falling
//! back to a messaging app) belongs to the platform layer behind `ShareSurface`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Title of the share dialog
pub const SHARE_DIALOG_TITLE: &str = "شارك كود الدعوة";

/// Link and text handed to the share sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareMessage {
    pub code: String,
    pub link: String,
    pub text: String,
    pub dialog_title: String,
}

/// Platform share sheet
#[async_trait]
pub trait ShareSurface: Send + Sync {
    async fn share(&self, message: &ShareMessage) -> Result<(), String>;
}

/// `{link_base}/{code}`, tolerating a trailing slash on the base
pub fn referral_link(link_base: &str, code: &str) -> String {
    format!("{}/{}", link_base.trim_end_matches('/'), code)
}

pub fn compose_share_message(link_base: &str, code: &str, bonus_days: u32) -> ShareMessage {
    let link = referral_link(link_base, code);
    let text = format!(
        "🎉 انضم إلي في تطبيق د. مجاهد للذكاء الاصطناعي!\n\n\
         ✨ احصل على {bonus_days} أيام تجربة مجانية إضافية عند استخدام كود الدعوة: {code}\n\n\
         📱 حمل التطبيق الآن: {link}\n\n\
         🎬 إنشاء فيديوهات احترافية\n\
         📸 استديو تصوير متطور\n\
         🤖 تقنية ذكاء اصطناعي متقدمة\n\n\
         #ذكاء_اصطناعي #فيديوهات #تطبيق"
    );

    ShareMessage {
        code: code.to_string(),
        link,
        text,
        dialog_title: SHARE_DIALOG_TITLE.to_string(),
    }
}
