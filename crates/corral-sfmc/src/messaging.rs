//! Triggered-send mail and SMS messaging.

use crate::rows::SfmcClient;
use corral_core::SyncResult;
use reqwest::Method;
use serde_json::json;

impl SfmcClient {
    /// Send a triggered-send message to one recipient.
    ///
    /// `subscriber_key` is the vendor's handle for the recipient (their
    /// email address or legacy CRM id); `token` rides along as a message
    /// attribute for recovery mails.
    pub async fn send_mail(
        &self,
        message_id: &str,
        email: &str,
        subscriber_key: &str,
        token: Option<&str>,
    ) -> SyncResult<()> {
        let path = format!("/messaging/v1/messageDefinitionSends/key:{message_id}/send");
        let mut to = json!({
            "Address": email,
            "SubscriberKey": subscriber_key,
        });
        if let Some(token) = token {
            to["ContactAttributes"] = json!({"SubscriberAttributes": {"Token__c": token}});
        }
        self.request(Method::POST, &path, &[], Some(&json!({"To": to})))
            .await?;
        Ok(())
    }

    /// Send an SMS message to the given numbers.
    ///
    /// Leading `+` signs are stripped; the vendor wants bare digits.
    pub async fn send_sms(&self, phone_numbers: &[String], message_id: &str) -> SyncResult<()> {
        let numbers: Vec<&str> = phone_numbers
            .iter()
            .map(|n| n.trim_start_matches('+'))
            .collect();
        let path = format!("/sms/v1/messageContact/{message_id}/send");
        let body = json!({
            "mobileNumbers": numbers,
            "Subscribe": true,
            "Resubscribe": true,
        });
        self.request(Method::POST, &path, &[], Some(&body)).await?;
        Ok(())
    }
}
