use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@][^\s.@]*\.[^\s@]+$").expect("email regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Outbound mail capability. Delivery details live behind this seam;
/// `false` means the message was not handed off and the caller must
/// treat the whole operation as failed.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, html: &str) -> bool;
}

/// Dev mailer: logs the message instead of delivering it and reports
/// success, mirroring local-development behavior.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, html: &str) -> bool {
        let preview: String = html.chars().take(200).collect();
        info!("[dev mail] to={} subject={}", to, subject);
        info!("[dev mail] body preview: {}...", preview);
        true
    }
}

/// Build the magic-link mail: returns (subject, html body). The link
/// points at the web UI's verify page, which posts the token back to
/// /api/auth/verify.
pub fn magic_link_email(token: &str, base_url: &str) -> (String, String) {
    let verify_url = format!("{}/auth/verify?token={}", base_url.trim_end_matches('/'), token);

    let subject = "登录验证 - Flowboard".to_string();
    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1>欢迎登录 Flowboard</h1>
    <p>您好，</p>
    <p>您请求登录 Flowboard。点击下方链接完成登录：</p>
    <p><a href="{verify_url}">登录 Flowboard</a></p>
    <p>或复制以下链接到浏览器中打开：</p>
    <p style="background: #f5f5f5; padding: 10px; word-break: break-all;">{verify_url}</p>
    <ul>
      <li>此链接 15 分钟内有效</li>
      <li>链接仅可使用一次</li>
      <li>如果这不是您的操作，请忽略此邮件</li>
    </ul>
    <p style="color: #666; font-size: 14px;">此邮件由 Flowboard 自动发送，请勿回复。</p>
  </body>
</html>
"#
    );

    (subject, html)
}
