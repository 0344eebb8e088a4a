// CyberRange: Deploying and operating GNS3 lab topologies
// Copyright (C) 2026 The CyberRange Authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use pretty_assertions::assert_eq;
use test_log::test;

use crate::{
    fake::FakeGns3,
    rest::{error_detail, ApiError, DeleteReport},
    rest_types::{HasConsole, LinkEndpoint, NodeStatus},
    ConsoleTarget,
};

#[test(tokio::test)]
async fn find_project() {
    let gns3 = FakeGns3::start().await;
    let id = gns3.add_project("lab-1");
    gns3.add_project("lab-2");
    let client = gns3.client();

    assert_eq!(client.find_project_id("lab-1").await.unwrap(), id);
    assert_eq!(
        client.project_by_id(&id).await.unwrap().map(|p| p.name),
        Some(String::from("lab-1"))
    );

    let err = client.find_project_id("lab-3").await.unwrap_err();
    assert!(matches!(err, ApiError::ProjectNotFound(_)));
    assert_eq!(err.to_string(), "Project named 'lab-3' not found");
}

#[test(tokio::test)]
async fn status_error_carries_context() {
    let gns3 = FakeGns3::start().await;
    let project = gns3.add_project("lab");
    let client = gns3.client();

    let err = client.get_node(&project, "nope").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    match &err {
        ApiError::Status {
            context,
            url,
            detail,
            ..
        } => {
            assert_eq!(context, &format!("GET /v2/projects/{project}/nodes/nope"));
            assert!(url.ends_with("/nodes/nope"));
            assert_eq!(detail.as_deref(), Some("Node not found"));
        }
        e => panic!("unexpected error {e}"),
    }
    assert_eq!(
        err.to_string(),
        format!("GNS3 API error (GET /v2/projects/{project}/nodes/nope): 404 Not Found - Node not found")
    );
}

#[test]
fn error_detail_sources() {
    assert_eq!(
        error_detail(r#"{"message": "boom"}"#),
        Some(String::from("boom"))
    );
    assert_eq!(
        error_detail(r#"{"error": "bad", "detail": "ignored"}"#),
        Some(String::from("bad"))
    );
    assert_eq!(
        error_detail(r#"{"detail": {"code": 3}}"#),
        Some(String::from(r#"{"code":3}"#))
    );
    assert_eq!(error_detail("  "), None);
    let long = "x".repeat(2000);
    assert_eq!(error_detail(&long).map(|d| d.len()), Some(500));
}

#[test(tokio::test)]
async fn create_nodes_and_links() {
    let gns3 = FakeGns3::start().await;
    let project = gns3.add_project("lab");
    let template = gns3.add_template("alpine", Some(5000));
    let client = gns3.client();

    let a = client
        .add_node_from_template(&project, &template, "PC1", 10, 20)
        .await
        .unwrap();
    let b = client
        .add_node_from_template(&project, &template, "PC2", 30, 40)
        .await
        .unwrap();
    assert_eq!((a.x, a.y), (10, 20));
    assert_eq!(a.template_id.as_deref(), Some(template.as_str()));
    assert_eq!(
        a.console_target("10.0.0.1"),
        Some(ConsoleTarget::new("10.0.0.1", 5000))
    );

    let link = client
        .create_link(
            &project,
            &LinkEndpoint::new(&a.node_id, 0, 0),
            &LinkEndpoint::new(&b.node_id, 1, 0),
        )
        .await
        .unwrap();
    assert!(link.touches(&a.node_id) && link.touches(&b.node_id));

    // the port is taken now
    let err = client
        .create_link(
            &project,
            &LinkEndpoint::new(&a.node_id, 0, 0),
            &LinkEndpoint::new(&b.node_id, 2, 0),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));

    client.start_node(&project, &a.node_id).await.unwrap();
    let a = client.get_node(&project, &a.node_id).await.unwrap();
    assert_eq!(a.status, NodeStatus::Started);
    assert_eq!(client.list_nodes(&project).await.unwrap().len(), 2);
    assert_eq!(client.list_links(&project).await.unwrap(), vec![link]);
}

#[test(tokio::test)]
async fn delete_all_nodes() {
    let gns3 = FakeGns3::start().await;
    let project = gns3.add_project("lab");
    let a = gns3.add_node(&project, "a", None, 0, 0);
    let b = gns3.add_node(&project, "b", None, 0, 0);
    let c = gns3.add_node(&project, "c", None, 0, 0);
    let client = gns3.client();
    for (x, y) in [(&a, &b), (&b, &c)] {
        client
            .create_link(
                &project,
                &LinkEndpoint::new(&x.node_id, 1, 0),
                &LinkEndpoint::new(&y.node_id, 2, 0),
            )
            .await
            .unwrap();
    }

    let report = client.delete_all_nodes(&project).await;
    assert_eq!(
        report,
        DeleteReport {
            nodes_deleted: 3,
            links_deleted: 2,
            errors: Vec::new()
        }
    );
    assert!(gns3.nodes(&project).is_empty());
    assert!(gns3.requests().contains(&format!("POST /v2/projects/{project}/nodes/stop")));
}

#[test(tokio::test)]
async fn delete_all_nodes_continues_after_failures() {
    let gns3 = FakeGns3::start().await;
    let project = gns3.add_project("lab");
    let a = gns3.add_node(&project, "a", None, 0, 0);
    gns3.add_node(&project, "b", None, 0, 0);
    gns3.fail("GET", &format!("/v2/projects/{project}/links"));
    gns3.fail("DELETE", &format!("/v2/projects/{project}/nodes/{}", a.node_id));

    let report = gns3.client().delete_all_nodes(&project).await;
    assert_eq!(report.nodes_deleted, 1);
    assert_eq!(report.links_deleted, 0);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].starts_with("Failed to list links: GNS3 API error"));
    assert!(report.errors[1].starts_with("Failed to delete node a:"));
    assert_eq!(gns3.nodes(&project), vec![a]);
}
